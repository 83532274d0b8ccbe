//! `lmlaunch` command-line front end.
//!
//! Wires settings, the GGUF reader and a terminal log sink into a
//! [`lmlaunch_runtime::Launcher`] and dispatches subcommands to handlers.

#![deny(unused_crate_dependencies)]

#[cfg(test)]
use tempfile as _;

// Used by the binary only
use dotenvy as _;
use tracing_subscriber as _;

pub mod bootstrap;
pub mod commands;
pub mod config_commands;
pub mod error;
pub mod handlers;
pub mod parser;
pub mod presentation;
pub mod sink;

// Re-export primary types for convenient access
pub use bootstrap::{CliConfig, CliContext, bootstrap};
pub use commands::Commands;
pub use config_commands::ConfigCommand;
pub use error::CliError;
pub use parser::Cli;
pub use sink::TerminalLogSink;
