//! Scene model — vectors, camera, and pickable targets.
//!
//! Rendering lives elsewhere; this module only carries what picking needs.

pub mod camera;
pub mod math;
pub mod target;

pub use camera::Camera;
pub use math::{Ray, Vec3};
pub use target::{default_targets, Bounds, Target};
