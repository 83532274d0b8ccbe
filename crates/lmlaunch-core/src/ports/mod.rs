//! Port definitions (trait abstractions) and domain errors.
//!
//! Ports define the interfaces the core expects from infrastructure.
//! They use only domain types.

pub mod gguf_reader;
pub mod log_sink;

use std::path::PathBuf;

use thiserror::Error;

pub use gguf_reader::{GgufHeader, GgufParseError, GgufReaderPort};
pub use log_sink::{LogSinkPort, LogStream, NoopLogSink};

use crate::paths::PathError;
use crate::settings::SettingsError;

/// Errors building or spawning a backend command.
///
/// Every variant is a configuration problem: the supervisor treats them
/// as terminal and does not restart.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// The engine executable could not be resolved.
    #[error("Executable '{name}' not found: {reason}")]
    ExecutableNotFound { name: String, reason: String },

    /// The engine's install directory is not configured.
    #[error("{0} install directory is not configured")]
    NotConfigured(&'static str),

    /// No Python interpreter inside the engine's venv.
    #[error("Couldn't find python venv in {0}")]
    InterpreterNotFound(PathBuf),

    /// Command-line options could not be split.
    #[error("Invalid options '{options}': {reason}")]
    InvalidOptions { options: String, reason: String },

    /// The model file or directory is gone.
    #[error("Model not found: {0}")]
    ModelNotFound(PathBuf),

    /// The OS refused to start the process.
    #[error("Failed to spawn {program}: {reason}")]
    Spawn { program: String, reason: String },
}

/// Top-level domain error for adapters.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Launch(#[from] LaunchError),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Path(#[from] PathError),

    /// Requested entity (e.g. a model label) does not exist.
    #[error("Not found: {0}")]
    NotFound(String),
}
