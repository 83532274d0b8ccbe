//! CLI bootstrap - the composition root.
//!
//! This module is the ONLY place where concrete implementations are wired
//! together: the settings file, the GGUF header parser and the terminal
//! log sink are handed to a [`Launcher`].

use std::path::PathBuf;
use std::sync::Arc;

use lmlaunch_core::{GgufReaderPort, LogSinkPort, Settings, config_path, load_settings};
use lmlaunch_gguf::GgufHeaderParser;
use lmlaunch_runtime::Launcher;
use tracing::debug;

use crate::error::CliError;
use crate::sink::TerminalLogSink;

/// Bootstrap configuration for the CLI.
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// Settings file to load and save.
    pub config_path: PathBuf,
    /// Echo backend output to the terminal.
    pub echo_output: bool,
}

impl CliConfig {
    /// Use `path` when given, else the default settings location.
    pub fn resolve(path: Option<PathBuf>) -> Result<Self, CliError> {
        let config_path = match path {
            Some(path) => path,
            None => config_path()?,
        };
        Ok(Self {
            config_path,
            echo_output: true,
        })
    }

    #[must_use]
    pub fn with_echo(mut self, echo_output: bool) -> Self {
        self.echo_output = echo_output;
        self
    }
}

/// Fully composed application context for CLI commands.
pub struct CliContext {
    pub launcher: Launcher,
    pub config_path: PathBuf,
}

impl CliContext {
    pub const fn launcher(&self) -> &Launcher {
        &self.launcher
    }
}

/// Load settings and build the launcher.
pub fn bootstrap(config: CliConfig) -> Result<CliContext, CliError> {
    let settings = load_settings(&config.config_path)?;
    debug!(path = %config.config_path.display(), "settings loaded");
    Ok(bootstrap_with(
        settings,
        config.config_path,
        Arc::new(GgufHeaderParser::new()),
        Arc::new(TerminalLogSink::new(config.echo_output)),
    ))
}

/// Bootstrap with explicit settings and ports (for testing).
pub fn bootstrap_with(
    settings: Settings,
    config_path: PathBuf,
    gguf: Arc<dyn GgufReaderPort>,
    sink: Arc<dyn LogSinkPort>,
) -> CliContext {
    CliContext {
        launcher: Launcher::new(settings, gguf, sink),
        config_path,
    }
}
