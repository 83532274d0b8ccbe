//! Best-effort model metadata for the info view.
//!
//! Readers return [`MetadataError`] for whole-model failures; the backend
//! turns those into a placeholder [`ModelInfo`](lmlaunch_core::ModelInfo)
//! so a broken file never blocks a start.

mod gguf;
mod hf;
mod safetensors;

pub use gguf::read_gguf_info;
pub use hf::read_hf_info;
pub use safetensors::{read_safetensors_header, repack_quantized, SafetensorsTensor};

use std::io;
use std::path::PathBuf;

use lmlaunch_core::{GgufParseError, ModelInfo};
use thiserror::Error;

/// Note added when a model carries no chat template.
pub const CHAT_TEMPLATE_MISSING: &str = "Chat template missing!";

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error(transparent)]
    Gguf(#[from] GgufParseError),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid safetensors header in {path}: {reason}")]
    Safetensors { path: PathBuf, reason: String },
}

impl MetadataError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

fn note_missing_template(info: &mut ModelInfo) {
    if info.chat_template.trim().is_empty() {
        info.notes.push(CHAT_TEMPLATE_MISSING.to_string());
    }
}
