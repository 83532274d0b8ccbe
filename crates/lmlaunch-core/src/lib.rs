//! Core domain types and port definitions for lmlaunch.
//!
//! This crate has no process or async dependencies. It holds:
//!
//! - the domain model (engines, catalog entries, model metadata, supervisor states)
//! - the request telemetry window and its aggregates
//! - settings, their validation and JSON persistence
//! - the model catalog scan
//! - ports implemented by the runtime and GGUF crates

#![deny(unused_crate_dependencies)]

pub mod catalog;
pub mod diagnostics;
pub mod domain;
pub mod paths;
pub mod ports;
pub mod settings;
pub mod telemetry;

// Re-export commonly used types for convenience
pub use catalog::scan_models;
pub use diagnostics::{ERROR_LOG_CAPACITY, ErrorLog, ErrorRecord};
pub use domain::{
    BackendKind, BuildInfo, ChatMessage, GgufHeader, GgufTensorInfo, GgufValue, ModelEntry,
    ModelInfo, RawMetadata, SupervisorState, TemplateVars, TensorRow, UNKNOWN_ARCHITECTURE,
    format_params, format_size,
};
pub use paths::{PathError, config_path, load_settings, resolve_model_dir, save_settings};
pub use ports::{
    CoreError, GgufParseError, GgufReaderPort, LaunchError, LogSinkPort, LogStream, NoopLogSink,
};
pub use settings::{
    GeneralSettings, LlamaCppSettings, Settings, SettingsError, TabbyApiSettings,
    validate_settings,
};
pub use telemetry::{RequestStat, TelemetrySnapshot, TelemetryWindow};
