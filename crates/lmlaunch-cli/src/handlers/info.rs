//! Info command handler.

use anyhow::Result;

use crate::bootstrap::CliContext;
use crate::handlers::models::resolve_entry;
use crate::presentation::format_model_info;

/// Print metadata for a model without starting it.
///
/// Unreadable metadata is reported through the notes, not as an error.
pub async fn execute(ctx: &CliContext, label: Option<String>, show_tensors: bool) -> Result<()> {
    let entry = resolve_entry(ctx, label)?;
    let info = ctx.launcher().inspect(&entry).await;
    print!("{}", format_model_info(&entry.label(), &info, show_tensors));
    Ok(())
}
