//! Interactive targets — stable id, intersectable bounds, on/off state.

use tracing::debug;

use super::math::{Ray, Vec3};

// ── Bounds ─────────────────────────────────────────────────

/// Bounding proxy used for ray picking.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bounds {
    Sphere { center: Vec3, radius: f32 },
    Aabb { min: Vec3, max: Vec3 },
}

impl Bounds {
    /// Whether the proxy describes a usable, non-degenerate volume.
    pub fn is_valid(&self) -> bool {
        match *self {
            Bounds::Sphere { center, radius } => {
                center.is_finite() && radius.is_finite() && radius > 0.0
            }
            Bounds::Aabb { min, max } => {
                min.is_finite()
                    && max.is_finite()
                    && min.x <= max.x
                    && min.y <= max.y
                    && min.z <= max.z
            }
        }
    }

    pub fn center(&self) -> Vec3 {
        match *self {
            Bounds::Sphere { center, .. } => center,
            Bounds::Aabb { min, max } => (min + max) * 0.5,
        }
    }

    /// Distance along `ray` to the first surface crossing in front of the
    /// origin. A ray starting inside the volume reports the exit point.
    pub fn intersect(&self, ray: &Ray) -> Option<f32> {
        match *self {
            Bounds::Sphere { center, radius } => intersect_sphere(ray, center, radius),
            Bounds::Aabb { min, max } => intersect_aabb(ray, min, max),
        }
    }

    /// Shortest distance from the ray (t >= 0) to the bounds surface.
    /// Zero when the ray touches or enters the volume.
    pub fn ray_gap(&self, ray: &Ray) -> f32 {
        if self.intersect(ray).is_some() {
            return 0.0;
        }
        match *self {
            Bounds::Sphere { center, radius } => {
                let (p, _) = ray.closest_point(center);
                (p.distance(center) - radius).max(0.0)
            }
            Bounds::Aabb { min, max } => aabb_gap(ray, min, max),
        }
    }

    pub fn to_sexp(&self) -> String {
        match self {
            Bounds::Sphere { center, radius } => format!(
                "(:shape :sphere :center {} :radius {:.3})",
                center.to_sexp(),
                radius
            ),
            Bounds::Aabb { min, max } => format!(
                "(:shape :box :min {} :max {})",
                min.to_sexp(),
                max.to_sexp()
            ),
        }
    }
}

fn intersect_sphere(ray: &Ray, center: Vec3, radius: f32) -> Option<f32> {
    let oc = ray.origin - center;
    let b = oc.dot(ray.direction);
    let c = oc.dot(oc) - radius * radius;
    let disc = b * b - c;
    if disc < 0.0 {
        return None;
    }
    let sqrt_disc = disc.sqrt();
    let t_near = -b - sqrt_disc;
    let t_far = -b + sqrt_disc;
    if t_near > f32::EPSILON {
        Some(t_near)
    } else if t_far > f32::EPSILON {
        Some(t_far)
    } else {
        None
    }
}

/// Slab test.
fn intersect_aabb(ray: &Ray, min: Vec3, max: Vec3) -> Option<f32> {
    let mut t_min = f32::NEG_INFINITY;
    let mut t_max = f32::INFINITY;
    let axes = [
        (ray.origin.x, ray.direction.x, min.x, max.x),
        (ray.origin.y, ray.direction.y, min.y, max.y),
        (ray.origin.z, ray.direction.z, min.z, max.z),
    ];
    for (o, d, lo, hi) in axes {
        if d.abs() < f32::EPSILON {
            if o < lo || o > hi {
                return None;
            }
            continue;
        }
        let inv = 1.0 / d;
        let mut t0 = (lo - o) * inv;
        let mut t1 = (hi - o) * inv;
        if t0 > t1 {
            std::mem::swap(&mut t0, &mut t1);
        }
        t_min = t_min.max(t0);
        t_max = t_max.min(t1);
        if t_min > t_max {
            return None;
        }
    }
    if t_min > f32::EPSILON {
        Some(t_min)
    } else if t_max > f32::EPSILON {
        Some(t_max)
    } else {
        None
    }
}

fn axes(v: Vec3) -> [f32; 3] {
    [v.x, v.y, v.z]
}

/// Exact ray-to-box distance.
///
/// The slab crossings split `t >= 0` into segments where the set of axes
/// lying outside the box is fixed; on each segment the squared gap is a
/// quadratic in `t` with a closed-form minimum.
fn aabb_gap(ray: &Ray, min: Vec3, max: Vec3) -> f32 {
    let (o, d) = (axes(ray.origin), axes(ray.direction));
    let (lo, hi) = (axes(min), axes(max));

    let mut breaks = vec![0.0f32];
    for i in 0..3 {
        if d[i].abs() < f32::EPSILON {
            continue;
        }
        for bound in [lo[i], hi[i]] {
            let t = (bound - o[i]) / d[i];
            if t > 0.0 && t.is_finite() {
                breaks.push(t);
            }
        }
    }
    breaks.sort_by(f32::total_cmp);

    let gap_at = |t: f32| {
        let p = ray.at(t);
        p.distance(p.max(min).min(max))
    };

    let mut best = f32::INFINITY;
    for (k, &start) in breaks.iter().enumerate() {
        let end = breaks.get(k + 1).copied().unwrap_or(f32::INFINITY);
        let sample_t = if end.is_finite() { 0.5 * (start + end) } else { start + 1.0 };
        let p = axes(ray.at(sample_t));
        let (mut num, mut den) = (0.0f32, 0.0f32);
        for i in 0..3 {
            let bound = if p[i] < lo[i] {
                lo[i]
            } else if p[i] > hi[i] {
                hi[i]
            } else {
                continue;
            };
            num += (o[i] - bound) * d[i];
            den += d[i] * d[i];
        }
        let t = if den > 0.0 { (-num / den).clamp(start, end) } else { start };
        best = best.min(gap_at(t));
    }
    best
}

// ── Target ─────────────────────────────────────────────────

/// A toggleable object in the scene.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub id: u64,
    pub label: String,
    /// `None` when the renderable has no usable geometry yet.
    pub bounds: Option<Bounds>,
    pub on: bool,
}

impl Target {
    pub fn new(id: u64, label: impl Into<String>, bounds: Bounds) -> Self {
        Self {
            id,
            label: label.into(),
            bounds: Some(bounds),
            on: false,
        }
    }

    pub fn sphere(id: u64, label: impl Into<String>, center: Vec3, radius: f32) -> Self {
        Self::new(id, label, Bounds::Sphere { center, radius })
    }

    /// Valid bounds, if any.
    pub fn pick_bounds(&self) -> Option<&Bounds> {
        self.bounds.as_ref().filter(|b| b.is_valid())
    }

    /// Flip the on/off state once.
    pub fn toggle(&mut self) {
        self.on = !self.on;
        debug!(
            "Target {} ({}) toggled {}",
            self.id,
            self.label,
            if self.on { "on" } else { "off" }
        );
    }

    pub fn to_sexp(&self) -> String {
        format!(
            "(:id {} :label \"{}\" :on {} :bounds {})",
            self.id,
            self.label.replace('\\', "\\\\").replace('"', "\\\""),
            if self.on { "t" } else { "nil" },
            self.bounds
                .map(|b| b.to_sexp())
                .unwrap_or_else(|| "nil".to_string()),
        )
    }
}

/// Three unit-ish spheres in a row in front of the default camera.
pub fn default_targets() -> Vec<Target> {
    vec![
        Target::sphere(1, "left", Vec3::new(-2.0, 0.0, 0.0), 0.6),
        Target::sphere(2, "center", Vec3::new(0.0, 0.0, 0.0), 0.6),
        Target::sphere(3, "right", Vec3::new(2.0, 0.0, 0.0), 0.6),
    ]
}
