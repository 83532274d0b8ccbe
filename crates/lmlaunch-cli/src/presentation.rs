//! Shared CLI presentation utilities.
//!
//! Format-only: every function returns the text to print so that handlers
//! stay thin and output can be tested.

use std::fmt::Write;

use lmlaunch_core::{
    ErrorRecord, ModelInfo, SupervisorState, TelemetrySnapshot, format_params, format_size,
};

/// Truncates a string to a maximum number of characters, adding "..." if needed.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

/// Format an optional value for display, returning a default if None.
pub fn format_optional<T: std::fmt::Display>(value: Option<T>, default: &str) -> String {
    value.map_or_else(|| default.to_string(), |v| v.to_string())
}

/// One status line: `[ready] ✅ Listening on http://...`.
pub fn format_status(state: SupervisorState, message: &str) -> String {
    format!("[{state}] {message}")
}

/// One-line telemetry summary.
pub fn format_telemetry(snapshot: &TelemetrySnapshot) -> String {
    format!(
        "{} request(s): {} tokens generated at {:.1} t/s, {} prompt tokens at {:.1} t/s",
        snapshot.request_count,
        snapshot.tokens_generated,
        snapshot.tokens_per_sec_generation,
        snapshot.tokens_processed,
        snapshot.tokens_per_sec_processing,
    )
}

/// Recent errors, newest first.
pub fn format_errors(errors: &[ErrorRecord]) -> String {
    let mut out = String::new();
    for record in errors {
        let _ = writeln!(out, "  {} {}", record.at.format("%H:%M:%S"), record.message);
    }
    out
}

/// Multi-line metadata report for `info`.
pub fn format_model_info(label: &str, info: &ModelInfo, show_tensors: bool) -> String {
    let vars = &info.template_vars;
    let mut out = String::new();
    let _ = writeln!(out, "Model:        {label}");
    let _ = writeln!(out, "Architecture: {}", info.architecture);
    let _ = writeln!(
        out,
        "Size:         {}",
        format_optional(info.size_bytes.map(format_size), "--")
    );
    let _ = writeln!(
        out,
        "Parameters:   {}",
        format_optional(info.param_count.map(format_params), "--")
    );
    let _ = writeln!(out, "Tensors:      {}", info.tensors.len());
    for (name, token) in [
        ("bos_token", &vars.bos_token),
        ("eos_token", &vars.eos_token),
        ("pad_token", &vars.pad_token),
        ("unk_token", &vars.unk_token),
    ] {
        let _ = writeln!(out, "{name:<13} {}", format_optional(token.as_deref(), "--"));
    }

    for note in &info.notes {
        let _ = writeln!(out, "⚠️  {note}");
    }

    if !info.chat_template.is_empty() {
        let _ = writeln!(out, "\nChat template:\n{}", info.chat_template.trim_end());
    }
    if show_tensors && !info.tensors.is_empty() {
        let _ = write!(out, "\n{}", info.tensor_table_markdown());
    }
    out
}
