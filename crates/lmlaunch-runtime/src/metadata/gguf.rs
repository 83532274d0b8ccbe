//! Model info for llama.cpp models.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use lmlaunch_core::{GgufHeader, GgufReaderPort, ModelInfo, TensorRow, UNKNOWN_ARCHITECTURE};
use regex::Regex;

use super::{MetadataError, note_missing_template};

static SPLIT_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.*)-(\d+)-of-(\d+)\.gguf$").expect("split name pattern is valid")
});

/// Read architecture, template, special tokens and tensors from a GGUF
/// header. Only the first part of a split model is parsed; the size covers
/// every part present on disk.
pub fn read_gguf_info(path: &Path, reader: &dyn GgufReaderPort) -> Result<ModelInfo, MetadataError> {
    let header = reader.read_header(path)?;
    let size = model_size(path)?;
    Ok(info_from_header(&header, size))
}

fn info_from_header(header: &GgufHeader, size_bytes: u64) -> ModelInfo {
    let mut info = ModelInfo {
        architecture: header
            .get_str("general.architecture")
            .unwrap_or(UNKNOWN_ARCHITECTURE)
            .to_string(),
        size_bytes: Some(size_bytes),
        param_count: header.param_count(),
        chat_template: header
            .get_str("tokenizer.chat_template")
            .unwrap_or_default()
            .to_string(),
        tensors: header
            .tensors
            .iter()
            .map(|t| TensorRow {
                name: t.name.clone(),
                kind: t.type_name(),
                dims: t.dims.clone(),
            })
            .collect(),
        ..ModelInfo::default()
    };

    let vars = &mut info.template_vars;
    vars.bos_token = header.token_text("tokenizer.ggml.bos_token_id");
    vars.eos_token = header.token_text("tokenizer.ggml.eos_token_id");
    vars.pad_token = header.token_text("tokenizer.ggml.padding_token_id");
    vars.unk_token = header.token_text("tokenizer.ggml.unknown_token_id");

    note_missing_template(&mut info);
    info
}

fn model_size(path: &Path) -> Result<u64, MetadataError> {
    let first = fs::metadata(path).map_err(|e| MetadataError::io(path, e))?.len();
    Ok(split_siblings(path).map_or(first, |parts| {
        parts
            .iter()
            .filter_map(|p| fs::metadata(p).ok())
            .map(|m| m.len())
            .sum()
    }))
}

/// All part paths of a `name-00001-of-00003.gguf` split model.
fn split_siblings(path: &Path) -> Option<Vec<PathBuf>> {
    let file_name = path.file_name()?.to_str()?;
    let caps = SPLIT_NAME.captures(file_name)?;
    let (prefix, width, total) = (&caps[1], caps[2].len(), &caps[3]);
    let count: usize = total.parse().ok()?;
    Some(
        (1..=count)
            .map(|i| path.with_file_name(format!("{prefix}-{i:0width$}-of-{total}.gguf")))
            .collect(),
    )
}
