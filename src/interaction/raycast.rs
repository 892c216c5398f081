//! Fingertip ray casting against scene targets.
//!
//! Pure functions: the same camera, point, and target set always produce the
//! same hit. Target ids are exposed every frame so callers can detect edges.

use crate::scene::{Camera, Ray, Target, Vec3};

/// Closest intersected target along a ray.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub target_id: u64,
    /// World-space intersection point.
    pub point: Vec3,
    /// Distance from the ray origin.
    pub distance: f32,
}

impl Hit {
    pub fn to_sexp(&self) -> String {
        format!(
            "(:target {} :distance {:.3} :point {})",
            self.target_id,
            self.distance,
            self.point.to_sexp()
        )
    }
}

/// Map normalized screen coordinates (y down) to device space (y up).
pub fn ndc_from_normalized(x: f32, y: f32) -> (f32, f32) {
    (2.0 * x - 1.0, 1.0 - 2.0 * y)
}

/// Build the pointing ray for a normalized fingertip position.
///
/// `None` when the camera is missing or unusable, or the point is not finite.
pub fn pointing_ray(camera: Option<&Camera>, point: Option<(f32, f32)>) -> Option<Ray> {
    let camera = camera.filter(|c| c.is_valid())?;
    let (x, y) = point?;
    if !x.is_finite() || !y.is_finite() {
        return None;
    }
    let (ndc_x, ndc_y) = ndc_from_normalized(x, y);
    Some(camera.ray_through_ndc(ndc_x, ndc_y))
}

/// Cast from `camera` through a normalized point and return the nearest hit.
pub fn cast(camera: Option<&Camera>, point: Option<(f32, f32)>, targets: &[Target]) -> Option<Hit> {
    if targets.is_empty() {
        return None;
    }
    let ray = pointing_ray(camera, point)?;
    cast_ray(&ray, targets)
}

/// Nearest target hit by `ray`. Targets without valid bounds are skipped.
///
/// Ties keep the earlier target in `targets`.
pub fn cast_ray(ray: &Ray, targets: &[Target]) -> Option<Hit> {
    let mut best: Option<Hit> = None;
    for target in targets {
        let Some(bounds) = target.pick_bounds() else {
            continue;
        };
        let Some(t) = bounds.intersect(ray) else {
            continue;
        };
        if best.map_or(true, |b| t < b.distance) {
            best = Some(Hit {
                target_id: target.id,
                point: ray.at(t),
                distance: t,
            });
        }
    }
    best
}

/// Target whose surface passes closest to `ray`, with that gap.
///
/// The gap is zero for targets the ray actually enters.
pub fn nearest_approach(ray: &Ray, targets: &[Target]) -> Option<(u64, f32)> {
    targets
        .iter()
        .filter_map(|t| t.pick_bounds().map(|b| (t.id, b.ray_gap(ray))))
        .filter(|(_, gap)| gap.is_finite())
        .fold(None, |best: Option<(u64, f32)>, cur| match best {
            Some(b) if b.1 <= cur.1 => Some(b),
            _ => Some(cur),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{default_targets, Bounds};

    #[test]
    fn test_ndc_mapping() {
        assert_eq!(ndc_from_normalized(0.5, 0.5), (0.0, 0.0));
        assert_eq!(ndc_from_normalized(0.0, 0.0), (-1.0, 1.0));
        assert_eq!(ndc_from_normalized(1.0, 1.0), (1.0, -1.0));
    }

    #[test]
    fn test_center_point_hits_center_target() {
        let cam = Camera::default();
        let targets = default_targets();
        let hit = cast(Some(&cam), Some((0.5, 0.5)), &targets).unwrap();
        assert_eq!(hit.target_id, 2);
        assert!((hit.distance - 4.4).abs() < 1e-4);
    }

    #[test]
    fn test_cast_is_deterministic() {
        let cam = Camera::default();
        let targets = default_targets();
        let first = cast(Some(&cam), Some((0.42, 0.51)), &targets);
        for _ in 0..10 {
            assert_eq!(cast(Some(&cam), Some((0.42, 0.51)), &targets), first);
        }
    }

    #[test]
    fn test_nearest_of_overlapping_targets() {
        let cam = Camera::default();
        let targets = vec![
            Target::sphere(10, "far", Vec3::new(0.0, 0.0, -3.0), 1.0),
            Target::sphere(11, "near", Vec3::new(0.0, 0.0, 1.0), 1.0),
        ];
        let hit = cast(Some(&cam), Some((0.5, 0.5)), &targets).unwrap();
        assert_eq!(hit.target_id, 11);
        assert!((hit.distance - 3.0).abs() < 1e-4);
        assert!((hit.point.z - 2.0).abs() < 1e-4);
    }

    #[test]
    fn test_missing_inputs_yield_none() {
        let cam = Camera::default();
        let targets = default_targets();
        assert!(cast(None, Some((0.5, 0.5)), &targets).is_none());
        assert!(cast(Some(&cam), None, &targets).is_none());
        assert!(cast(Some(&cam), Some((0.5, 0.5)), &[]).is_none());
        assert!(cast(Some(&cam), Some((f32::NAN, 0.5)), &targets).is_none());
    }

    #[test]
    fn test_pointing_away_misses() {
        let cam = Camera::default();
        let targets = default_targets();
        assert!(cast(Some(&cam), Some((0.5, 0.0)), &targets).is_none());
    }

    #[test]
    fn test_invalid_bounds_skipped() {
        let cam = Camera::default();
        let mut targets = vec![
            Target::sphere(1, "broken", Vec3::new(0.0, 0.0, 2.0), 0.0),
            Target::sphere(2, "ok", Vec3::ZERO, 1.0),
        ];
        let hit = cast(Some(&cam), Some((0.5, 0.5)), &targets).unwrap();
        assert_eq!(hit.target_id, 2);
        targets[1].bounds = None;
        assert!(cast(Some(&cam), Some((0.5, 0.5)), &targets).is_none());
    }

    #[test]
    fn test_aabb_target() {
        let cam = Camera::default();
        let targets = vec![Target::new(
            4,
            "box",
            Bounds::Aabb {
                min: Vec3::new(-0.5, -0.5, -0.5),
                max: Vec3::new(0.5, 0.5, 0.5),
            },
        )];
        let hit = cast(Some(&cam), Some((0.5, 0.5)), &targets).unwrap();
        assert_eq!(hit.target_id, 4);
        assert!((hit.distance - 4.5).abs() < 1e-4);
    }

    #[test]
    fn test_nearest_approach() {
        let ray = Ray::new(Vec3::new(0.0, 0.0, 5.0), Vec3::NEG_Z);
        let targets = vec![
            Target::sphere(1, "a", Vec3::new(3.0, 0.0, 0.0), 1.0),
            Target::sphere(2, "b", Vec3::new(-1.3, 0.0, 0.0), 1.0),
        ];
        let (id, gap) = nearest_approach(&ray, &targets).unwrap();
        assert_eq!(id, 2);
        assert!((gap - 0.3).abs() < 1e-4);
        assert!(nearest_approach(&ray, &[]).is_none());
    }
}
