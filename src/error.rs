//! Error types for the playhead engine
//!
//! Defines engine-specific error types using thiserror for clear error propagation.

use thiserror::Error;

/// Main error type for the playhead engine
#[derive(Error, Debug)]
pub enum Error {
    /// No registered decoder backend recognizes the source
    #[error("Unsupported format: no decoder backend matched the source header")]
    UnsupportedFormat,

    /// Unrecoverable header or stream corruption
    #[error("Malformed stream: {0}")]
    Malformed(String),

    /// A single corrupt frame inside an otherwise healthy stream.
    ///
    /// Recoverable: the feed loop skips the frame and continues, surfacing a
    /// warning event instead of failing the session.
    #[error("Corrupt frame: {0}")]
    FrameCorrupt(String),

    /// Audio output device errors
    #[error("Audio device error: {0}")]
    Device(String),

    /// The source cannot seek (e.g. forward-only stream without tables)
    #[error("Seek not supported by this source")]
    SeekUnsupported,

    /// Operation not valid in the current session state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Configuration loading or validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the feed loop may continue decoding after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::FrameCorrupt(_))
    }
}

/// Convenience Result type using the playhead Error
pub type Result<T> = std::result::Result<T, Error>;
