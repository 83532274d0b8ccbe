//! Model catalog: discovering servable models under the models directory.
//!
//! - `*.gguf` files are llama.cpp models. Split models list only their
//!   first part (`-00001-of-00003.gguf`).
//! - Directories holding both `config.json` and `tokenizer_config.json` are
//!   TabbyAPI (EXL2/EXL3) models.
//!
//! Only engines the caller reports as available contribute entries.

use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::domain::{BackendKind, ModelEntry};
use crate::paths::PathError;

static SPLIT_PART: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)-of-(\d+)").expect("split-part pattern is valid"));

/// Scan `model_dir` recursively for models served by an available engine.
///
/// Entries are sorted by label. Hidden directories are skipped, as are
/// subdirectories that cannot be read.
pub fn scan_models(
    model_dir: &Path,
    available: &[BackendKind],
) -> Result<Vec<ModelEntry>, PathError> {
    if !model_dir.exists() {
        return Err(PathError::DirectoryNotFound(model_dir.to_path_buf()));
    }
    if !model_dir.is_dir() {
        return Err(PathError::NotADirectory(model_dir.to_path_buf()));
    }

    let mut entries = Vec::new();
    let root = fs::read_dir(model_dir).map_err(|e| PathError::ReadFailed {
        path: model_dir.to_path_buf(),
        reason: e.to_string(),
    })?;
    walk(model_dir, model_dir, root, available, &mut entries);

    entries.sort_by_key(ModelEntry::label);
    debug!(dir = %model_dir.display(), count = entries.len(), "Scanned model catalog");
    Ok(entries)
}

fn walk(
    model_dir: &Path,
    dir: &Path,
    listing: fs::ReadDir,
    available: &[BackendKind],
    out: &mut Vec<ModelEntry>,
) {
    let llama = available.contains(&BackendKind::LlamaCpp);
    let tabby = available.contains(&BackendKind::TabbyApi);

    if tabby && dir != model_dir && is_tabby_model_dir(dir) {
        if let Some(rel) = relative(model_dir, dir) {
            out.push(ModelEntry::new(rel, model_dir, BackendKind::TabbyApi));
        }
    }

    for entry in listing.flatten() {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();

        if path.is_dir() {
            if name.starts_with('.') {
                continue;
            }
            match fs::read_dir(&path) {
                Ok(sub) => walk(model_dir, &path, sub, available, out),
                Err(e) => warn!(dir = %path.display(), error = %e, "Skipping unreadable directory"),
            }
        } else if llama && is_gguf_entry_point(&name) {
            if let Some(rel) = relative(model_dir, &path) {
                out.push(ModelEntry::new(rel, model_dir, BackendKind::LlamaCpp));
            }
        }
    }
}

fn is_tabby_model_dir(dir: &Path) -> bool {
    dir.join("config.json").is_file() && dir.join("tokenizer_config.json").is_file()
}

/// A `.gguf` file that is not a continuation part of a split model.
fn is_gguf_entry_point(file_name: &str) -> bool {
    if !file_name.to_ascii_lowercase().ends_with(".gguf") {
        return false;
    }
    match SPLIT_PART.captures(file_name) {
        Some(caps) => caps[1].parse::<u64>().is_ok_and(|part| part <= 1),
        None => true,
    }
}

fn relative(model_dir: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(model_dir).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn split_parts_are_skipped() {
        assert!(is_gguf_entry_point("model.gguf"));
        assert!(is_gguf_entry_point("Model.GGUF"));
        assert!(is_gguf_entry_point("big-00001-of-00003.gguf"));
        assert!(!is_gguf_entry_point("big-00002-of-00003.gguf"));
        assert!(!is_gguf_entry_point("readme.md"));
    }

    #[test]
    fn scan_finds_both_engines_sorted() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        touch(&root.join("b/zeta.gguf"));
        touch(&root.join("a.gguf"));
        touch(&root.join("split/big-00001-of-00002.gguf"));
        touch(&root.join("split/big-00002-of-00002.gguf"));
        touch(&root.join("exl/llama-4bpw/config.json"));
        touch(&root.join("exl/llama-4bpw/tokenizer_config.json"));
        touch(&root.join("exl/incomplete/config.json"));
        touch(&root.join(".cache/hidden.gguf"));

        let entries = scan_models(root, &BackendKind::ALL).unwrap();
        let labels: Vec<_> = entries.iter().map(ModelEntry::label).collect();
        assert_eq!(
            labels,
            vec![
                "a.gguf [llama.cpp]",
                "b/zeta.gguf [llama.cpp]",
                "exl/llama-4bpw [tabbyapi]",
                "split/big-00001-of-00002.gguf [llama.cpp]",
            ]
        );
    }

    #[test]
    fn unavailable_engines_contribute_nothing() {
        let temp = tempdir().unwrap();
        touch(&temp.path().join("a.gguf"));
        touch(&temp.path().join("m/config.json"));
        touch(&temp.path().join("m/tokenizer_config.json"));

        let only_tabby = scan_models(temp.path(), &[BackendKind::TabbyApi]).unwrap();
        assert_eq!(only_tabby.len(), 1);
        assert_eq!(only_tabby[0].kind, BackendKind::TabbyApi);

        assert!(scan_models(temp.path(), &[]).unwrap().is_empty());
    }

    #[test]
    fn missing_dir_is_an_error() {
        let temp = tempdir().unwrap();
        assert!(matches!(
            scan_models(&temp.path().join("absent"), &BackendKind::ALL),
            Err(PathError::DirectoryNotFound(_))
        ));
    }
}
