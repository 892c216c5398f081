//! pinchray — hand-pointing ray caster with pinch toggles and interaction metrics.
//!
//! Hand landmark frames drive a pointing ray into a small scene of targets;
//! a hysteresis pinch classifier toggles whatever the ray hits, and every
//! attempt is recorded for accuracy, latency, dwell, and frame-rate metrics.

pub mod backend;
pub mod hand;
pub mod interaction;
pub mod ipc;
pub mod metrics;
pub mod scene;
pub mod state;
