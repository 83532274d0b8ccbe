//! Model info for TabbyAPI (Hugging Face layout) model directories.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use lmlaunch_core::{ModelInfo, UNKNOWN_ARCHITECTURE};
use serde_json::{Map, Value};
use tracing::warn;

use super::safetensors::{SafetensorsTensor, read_safetensors_header, repack_quantized};
use super::{MetadataError, note_missing_template};

/// Read `config.json`, `tokenizer_config.json` and every safetensors
/// header under `dir`.
///
/// Missing or malformed JSON files count as empty; unreadable safetensors
/// files are skipped with a note.
pub fn read_hf_info(dir: &Path) -> Result<ModelInfo, MetadataError> {
    let mut files = Vec::new();
    collect_files(dir, &mut files)?;

    let config = load_json_object(&dir.join("config.json"));
    let tokenizer_config = load_json_object(&dir.join("tokenizer_config.json"));

    let mut info = ModelInfo {
        architecture: config
            .get("model_type")
            .and_then(Value::as_str)
            .unwrap_or(UNKNOWN_ARCHITECTURE)
            .to_string(),
        ..ModelInfo::default()
    };

    info.chat_template = chat_template(&tokenizer_config)
        .or_else(|| chat_template(&config))
        .or_else(|| fs::read_to_string(dir.join("chat_template.jinja")).ok())
        .unwrap_or_default();

    let vars = &mut info.template_vars;
    vars.bos_token = special_token(&tokenizer_config, "bos_token");
    vars.eos_token = special_token(&tokenizer_config, "eos_token");
    vars.pad_token = special_token(&tokenizer_config, "pad_token");
    vars.unk_token = special_token(&tokenizer_config, "unk_token");

    let mut size = 0;
    let mut tensors: BTreeMap<String, SafetensorsTensor> = BTreeMap::new();
    for (path, len) in &files {
        size += len;
        if path.extension().is_none_or(|ext| ext != "safetensors") {
            continue;
        }
        match read_safetensors_header(path) {
            Ok(entries) => tensors.extend(entries),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable safetensors file");
                info.notes.push(e.to_string());
            }
        }
    }

    info.size_bytes = Some(size);
    info.tensors = repack_quantized(tensors);
    info.param_count = info
        .tensors
        .iter()
        .filter(|row| !row.dims.is_empty())
        .try_fold(0u64, |total, row| total.checked_add(row.elements()?));

    note_missing_template(&mut info);
    Ok(info)
}

fn collect_files(dir: &Path, out: &mut Vec<(PathBuf, u64)>) -> Result<(), MetadataError> {
    let entries = fs::read_dir(dir).map_err(|e| MetadataError::io(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| MetadataError::io(dir, e))?;
        let path = entry.path();
        let meta = entry.metadata().map_err(|e| MetadataError::io(&path, e))?;
        if meta.is_dir() {
            collect_files(&path, out)?;
        } else {
            out.push((path, meta.len()));
        }
    }
    Ok(())
}

fn load_json_object(path: &Path) -> Map<String, Value> {
    fs::read_to_string(path)
        .ok()
        .and_then(|text| serde_json::from_str::<Value>(&text).ok())
        .and_then(|value| match value {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .unwrap_or_default()
}

/// `chat_template` as a string, or the `default` entry of a named list.
fn chat_template(config: &Map<String, Value>) -> Option<String> {
    match config.get("chat_template")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Array(named) => named
            .iter()
            .find(|t| t.get("name").and_then(Value::as_str) == Some("default"))
            .and_then(|t| t.get("template"))
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}

/// Special tokens are either plain strings or `{"content": ...}` objects.
fn special_token(config: &Map<String, Value>, key: &str) -> Option<String> {
    match config.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Object(token) => token.get("content").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}
