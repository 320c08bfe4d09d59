//! # Error Types
//!
//! Errors raised while decoding protocol structures from raw mailbox bytes.

use thiserror::Error;

/// Errors decoding a header or reply from a byte buffer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeaderError {
    /// Buffer shorter than the structure being decoded.
    #[error("Truncated buffer: need {needed} bytes, got {got}")]
    Truncated { needed: usize, got: usize },

    /// Payload larger than the protocol allows.
    #[error("Message too large: {size} > {max}")]
    TooLarge { size: usize, max: usize },
}
