//! Internal error types for GGUF reading.
//!
//! Richer than the port's `GgufParseError`, which they convert into.

use std::io;

use lmlaunch_core::GgufParseError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GgufInternalError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Invalid GGUF file: wrong magic number")]
    InvalidMagic,

    #[error("Unsupported GGUF version: {0}")]
    UnsupportedVersion(u32),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid UTF-8 string in GGUF file")]
    Utf8Error,

    #[error("Unknown GGUF value type: {0}")]
    InvalidValueType(u32),

    /// A length or count field exceeds sane bounds (corrupt file).
    #[error("{what} of {value} exceeds limit")]
    TooLarge { what: &'static str, value: u64 },
}

impl From<GgufInternalError> for GgufParseError {
    fn from(err: GgufInternalError) -> Self {
        match err {
            GgufInternalError::FileNotFound(path) => Self::NotFound(path),
            GgufInternalError::Io(e) => Self::Io(e.to_string()),
            other => Self::InvalidFormat(other.to_string()),
        }
    }
}

pub type GgufResult<T> = Result<T, GgufInternalError>;
