//! GGUF header reading for lmlaunch.
//!
//! Implements [`lmlaunch_core::GgufReaderPort`]: reads the metadata
//! key/values and the tensor directory of a `.gguf` file, without mapping
//! tensor data.

#![deny(unused_crate_dependencies)]

mod error;
mod format;
mod parser;
mod reader;

pub use parser::GgufHeaderParser;

// Re-export the port and header types for convenience
pub use lmlaunch_core::domain::gguf::ggml_type_name;
pub use lmlaunch_core::{GgufHeader, GgufParseError, GgufReaderPort, GgufTensorInfo, GgufValue};
