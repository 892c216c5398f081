//! Hand input — landmark frames and pinch recognition.

pub mod landmarks;
pub mod pinch;

pub use landmarks::{HandFrame, Landmark, LANDMARK_COUNT};
pub use pinch::{PinchClassifier, PinchConfig, PinchEvent, PinchEventKind, PinchPhase};
