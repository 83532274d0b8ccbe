//! Command handlers that delegate to the [`Launcher`](lmlaunch_runtime::Launcher).
//!
//! Handlers follow the canonical pattern:
//! - Signature: `pub fn execute(ctx: &CliContext, ...) -> Result<()>` (async where needed)
//! - Thin wrappers that:
//!   1. Parse/validate CLI-specific input
//!   2. Call launcher methods
//!   3. Format output for the terminal

pub mod config;
pub mod info;
pub mod models;
pub mod serve;
