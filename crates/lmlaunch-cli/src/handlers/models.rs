//! Models command handler.

use anyhow::Result;
use lmlaunch_core::{ModelEntry, resolve_model_dir};

use crate::bootstrap::CliContext;
use crate::error::CliError;

/// Execute the models command: rescan and list the catalog.
///
/// The configured model is marked with `*`.
pub fn execute(ctx: &CliContext) -> Result<()> {
    let launcher = ctx.launcher();
    let settings = launcher.settings();
    let count = launcher.refresh_models().map_err(CliError::from)?;

    if count == 0 {
        let dir = resolve_model_dir(&settings).map_err(CliError::from)?;
        println!("No models found in {}.", dir.display());
        println!("Use 'lmlaunch config set general.model_dir <path>' to point elsewhere.");
        return Ok(());
    }

    println!("Found {count} model(s):\n");
    let selected = settings.general.model.unwrap_or_default();
    for entry in launcher.models() {
        let label = entry.label();
        let marker = if label == selected { '*' } else { ' ' };
        println!("{marker} {label}");
    }
    Ok(())
}

/// Catalog entry for `label`, or for the configured model when `None`.
pub fn resolve_entry(ctx: &CliContext, label: Option<String>) -> Result<ModelEntry, CliError> {
    let launcher = ctx.launcher();
    let label = label
        .or_else(|| launcher.settings().general.model)
        .filter(|label| !label.trim().is_empty())
        .ok_or_else(|| {
            CliError::Arguments(
                "No model given and none configured (see 'lmlaunch models')".to_string(),
            )
        })?;

    if launcher.models().is_empty() {
        launcher.refresh_models()?;
    }
    launcher
        .find_model(&label)
        .ok_or_else(|| CliError::Arguments(format!("Model not found: {label}")))
}
