//! Perspective camera used to unproject fingertip positions into rays.

use super::math::{Ray, Vec3};

/// Pinhole camera with a look-at basis.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    /// Unit view direction.
    pub forward: Vec3,
    /// Unit up vector, orthogonal to `forward`.
    pub up: Vec3,
    /// Unit right vector.
    pub right: Vec3,
    /// Vertical field of view in degrees.
    pub fov_y_deg: f32,
    /// Width / height.
    pub aspect: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self::look_at(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y, 75.0, 16.0 / 9.0)
    }
}

impl Camera {
    /// Build a camera at `eye` looking at `target`.
    ///
    /// Falls back to looking down -Z when `eye == target`, and picks another
    /// up reference when `up` is parallel to the view direction.
    pub fn look_at(eye: Vec3, target: Vec3, up: Vec3, fov_y_deg: f32, aspect: f32) -> Self {
        let mut forward = (target - eye).normalize();
        if forward == Vec3::ZERO {
            forward = Vec3::NEG_Z;
        }
        let mut right = forward.cross(up).normalize();
        if right == Vec3::ZERO {
            right = forward.cross(Vec3::new(0.0, 0.0, 1.0)).normalize();
            if right == Vec3::ZERO {
                right = Vec3::new(1.0, 0.0, 0.0);
            }
        }
        let up = right.cross(forward).normalize();
        Self {
            position: eye,
            forward,
            up,
            right,
            fov_y_deg,
            aspect,
        }
    }

    /// Whether the camera can produce meaningful rays.
    pub fn is_valid(&self) -> bool {
        self.position.is_finite()
            && self.forward != Vec3::ZERO
            && self.fov_y_deg > 0.0
            && self.fov_y_deg < 180.0
            && self.aspect > 0.0
            && self.aspect.is_finite()
    }

    /// Ray from the camera through a device-normalized point (x, y in [-1, 1], y up).
    pub fn ray_through_ndc(&self, ndc_x: f32, ndc_y: f32) -> Ray {
        let half_h = (self.fov_y_deg.to_radians() * 0.5).tan();
        let half_w = half_h * self.aspect;
        let direction =
            self.forward + self.right * (ndc_x * half_w) + self.up * (ndc_y * half_h);
        Ray::new(self.position, direction)
    }

    pub fn to_sexp(&self) -> String {
        format!(
            "(:position {} :forward {} :fov {:.1} :aspect {:.3})",
            self.position.to_sexp(),
            self.forward.to_sexp(),
            self.fov_y_deg,
            self.aspect,
        )
    }
}
