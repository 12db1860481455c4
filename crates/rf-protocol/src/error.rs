//! Error types for frame parsing and radio channel operations

use thiserror::Error;

/// Errors that can occur while reading a frame from text
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// A character other than `0` or `1` was found
    #[error("invalid bit {found:?} at position {position}")]
    InvalidBit { position: usize, found: char },
}

/// Errors reported by the radio channel handle
///
/// These come from the hardware layer and are never swallowed by the
/// signal manager.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RadioError {
    /// The radio refused the request
    #[error("radio rejected request: {0}")]
    Rejected(String),

    /// The transceiver is not available
    #[error("radio unavailable")]
    Unavailable,

    /// The channel handle went away before answering
    #[error("radio channel closed")]
    ChannelClosed,
}
