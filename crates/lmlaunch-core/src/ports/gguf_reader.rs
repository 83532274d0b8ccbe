//! GGUF header reader port.
//!
//! The llama.cpp backend reads model metadata through this port so the
//! runtime does not depend on the binary format crate directly.
//! The implementation lives in `lmlaunch-gguf`.

use std::path::Path;

use thiserror::Error;

pub use crate::domain::gguf::GgufHeader;

/// Errors that can occur while reading a GGUF header.
#[derive(Debug, Error)]
pub enum GgufParseError {
    /// The file does not exist.
    #[error("File not found: {0}")]
    NotFound(String),

    /// The file is not a valid GGUF file.
    #[error("Invalid GGUF format: {0}")]
    InvalidFormat(String),

    /// IO error while reading the file.
    #[error("IO error: {0}")]
    Io(String),
}

/// Port for reading GGUF headers (metadata and tensor directory).
pub trait GgufReaderPort: Send + Sync {
    fn read_header(&self, file_path: &Path) -> Result<GgufHeader, GgufParseError>;
}
