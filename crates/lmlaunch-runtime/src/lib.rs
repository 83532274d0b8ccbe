//! Backend process supervision for lmlaunch.
//!
//! - [`backend`]: the engine variants and how their commands are built
//! - [`process`]: supervisor state machine, output streaming, shutdown
//! - [`telemetry`]: per-engine request timing parsers
//! - [`metadata`]: model info from GGUF headers and safetensors directories
//! - [`launcher`]: the facade front-ends drive

#![deny(unused_crate_dependencies)]

pub mod backend;
pub mod env;
pub mod launcher;
pub mod metadata;
pub mod process;
pub mod telemetry;

pub use backend::{BackendController, LaunchCommand, ReadySignal};
pub use launcher::{Launcher, STATUS_BUSY, STATUS_NO_MODEL};
pub use metadata::MetadataError;
pub use process::{ProcessSupervisor, StatusUpdate, StreamingLogReader, SupervisorConfig};
pub use telemetry::TelemetryParser;
