//! Console protocol — line-oriented s-expression messages.

pub mod dispatch;

pub use dispatch::{handle_message, handle_value, message_type, parse_message};
