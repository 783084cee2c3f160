//! Error types for protocol operations

use thiserror::Error;

/// Protocol-specific errors
///
/// Every variant aborts only the decode pass of the buffer it was raised in;
/// later transport messages are decoded independently.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// A frame header declared a size of zero
    #[error("Frame declared zero size")]
    ZeroSizeFrame,

    /// Type tag with no registered message kind
    #[error("Unknown frame type: {0}")]
    UnknownType(i8),

    /// Buffer ended before a header, field or frame was complete
    #[error("Truncated buffer: needed {needed} bytes, {available} available")]
    Truncated {
        /// Bytes required by the read
        needed: usize,
        /// Bytes actually left in the buffer
        available: usize,
    },

    /// String field that is empty where a value is required, or not UTF-8
    #[error("Malformed string: {0}")]
    MalformedString(String),

    /// Frame too large
    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge {
        /// Actual frame size
        size: usize,
        /// Maximum allowed size
        max: usize,
    },
}

impl ProtocolError {
    /// Shorthand for a short read
    pub(crate) fn truncated(needed: usize, available: usize) -> Self {
        Self::Truncated { needed, available }
    }
}
