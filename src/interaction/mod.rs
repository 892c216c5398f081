//! Pointing and pinch interaction — ray picking and gesture correlation.

pub mod correlator;
pub mod raycast;

pub use correlator::{CorrelatorConfig, InteractionCorrelator, InteractionEvent};
pub use raycast::{cast, cast_ray, nearest_approach, ndc_from_normalized, pointing_ray, Hit};
