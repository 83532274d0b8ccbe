//! Model catalog entries and the metadata shown for a loaded model.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::backend::BackendKind;

/// Placeholder architecture name when the model does not declare one.
pub const UNKNOWN_ARCHITECTURE: &str = "*unknown*";

/// One servable model discovered under the models directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelEntry {
    /// Path relative to `model_dir`, always `/`-separated.
    pub path: String,
    /// Directory the catalog was scanned from.
    pub model_dir: PathBuf,
    /// Engine that serves this model.
    pub kind: BackendKind,
}

impl ModelEntry {
    pub fn new(path: impl Into<String>, model_dir: impl Into<PathBuf>, kind: BackendKind) -> Self {
        Self {
            path: path.into(),
            model_dir: model_dir.into(),
            kind,
        }
    }

    /// Display label, unique within a catalog: `"{path} [{engine}]"`.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{} [{}]", self.path, self.kind)
    }

    /// Absolute (or model-dir relative) location on disk.
    #[must_use]
    pub fn full_path(&self) -> PathBuf {
        self.model_dir.join(&self.path)
    }

    /// File stem used as the served model alias.
    #[must_use]
    pub fn stem(&self) -> String {
        Path::new(&self.path)
            .file_stem()
            .map_or_else(|| self.path.clone(), |s| s.to_string_lossy().into_owned())
    }
}

/// One message of the sample conversation used to preview chat templates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
        }
    }
}

/// Variables a chat template is rendered with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateVars {
    pub messages: Vec<ChatMessage>,
    pub bos_token: Option<String>,
    pub eos_token: Option<String>,
    pub pad_token: Option<String>,
    pub unk_token: Option<String>,
}

impl TemplateVars {
    /// Template variables with the sample conversation and no special tokens.
    #[must_use]
    pub fn with_sample_messages() -> Self {
        Self {
            messages: vec![
                ChatMessage::new("system", "You are a helpful assistant"),
                ChatMessage::new("user", "What is 1+1?"),
                ChatMessage::new("assistant", "It's 2."),
                ChatMessage::new("user", "Thank you."),
                ChatMessage::new("assistant", "No problem."),
            ],
            ..Self::default()
        }
    }
}

/// One row of the tensor table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorRow {
    pub name: String,
    /// Storage type, e.g. `Q4_K`, `BF16` or `4.0bpw` for repacked EXL tensors.
    pub kind: String,
    pub dims: Vec<u64>,
}

impl TensorRow {
    /// Number of elements (product of dimensions), `None` on overflow.
    #[must_use]
    pub fn elements(&self) -> Option<u64> {
        self.dims
            .iter()
            .try_fold(1u64, |acc, &dim| acc.checked_mul(dim))
    }
}

/// Metadata for the model a run was started with.
///
/// Built once per start and shared read-only. Fields that could not be
/// read degrade to placeholders and add an entry to `notes`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub architecture: String,
    pub size_bytes: Option<u64>,
    pub param_count: Option<u64>,
    pub chat_template: String,
    pub template_vars: TemplateVars,
    pub tensors: Vec<TensorRow>,
    pub notes: Vec<String>,
}

impl Default for ModelInfo {
    fn default() -> Self {
        Self {
            architecture: UNKNOWN_ARCHITECTURE.to_string(),
            size_bytes: None,
            param_count: None,
            chat_template: String::new(),
            template_vars: TemplateVars::with_sample_messages(),
            tensors: Vec::new(),
            notes: Vec::new(),
        }
    }
}

impl ModelInfo {
    /// Placeholder info carrying a single explanatory note.
    #[must_use]
    pub fn placeholder(note: impl Into<String>) -> Self {
        Self {
            notes: vec![note.into()],
            ..Self::default()
        }
    }

    /// Render the tensor table as markdown.
    #[must_use]
    pub fn tensor_table_markdown(&self) -> String {
        let mut out = String::from("| name | type | size |\n|---|---|---|\n");
        for row in &self.tensors {
            let dims = row
                .dims
                .iter()
                .map(u64::to_string)
                .collect::<Vec<_>>()
                .join(" x ");
            let _ = writeln!(out, "| {} | {} | {} |", row.name, row.kind, dims);
        }
        out
    }
}

/// Format a byte count with a binary-ish unit suffix (`"4.37 GB"`).
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.2} {}", UNITS[unit])
    }
}

/// Format a parameter count as `"7.24B"`, `"350.00M"`, ...
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_params(count: u64) -> String {
    let value = count as f64;
    if value >= 1e9 {
        format!("{:.2}B", value / 1e9)
    } else if value >= 1e6 {
        format!("{:.2}M", value / 1e6)
    } else if value >= 1e3 {
        format!("{:.2}K", value / 1e3)
    } else {
        count.to_string()
    }
}
