//! Small formatting helpers shared across modules.

pub mod format;

pub use format::{encode_component, redact_token};
