//! Common types shared between the detection client and anything talking to the detection
//! backend.
pub mod protocol;

/// Error type.
pub type Error = Box<dyn std::error::Error>;
