//! Backend engines.
//!
//! [`BackendController`] is a closed set of engine variants. Everything the
//! supervisor needs to know about an engine (how to launch it, how to tell
//! it is ready, how to read its telemetry) goes through it.

mod command;
mod llamacpp;
mod overrides;
mod tabbyapi;
mod url;

pub use command::{LaunchCommand, LaunchCommandBuilder};
pub use llamacpp::LlamaCppBackend;
pub use overrides::{select_permodel_options, split_options};
pub use tabbyapi::TabbyApiBackend;
pub use url::{access_url, local_ip};

use std::sync::{Arc, Mutex};
use std::time::Duration;

use lmlaunch_core::{
    BackendKind, BuildInfo, GgufReaderPort, LaunchError, LogSinkPort, ModelEntry, ModelInfo,
    Settings, TelemetryWindow,
};
use tokio::io::AsyncRead;
use tokio::sync::mpsc::UnboundedSender;
use tracing::warn;

use crate::metadata::MetadataError;
use crate::process::{LogLine, StreamingLogReader};
use crate::telemetry::TelemetryParser;

/// The backend reported that it accepts requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadySignal {
    /// URL found on the ready line, with a wildcard host resolved.
    pub access_url: Option<String>,
}

impl ReadySignal {
    /// Status shown once ready.
    #[must_use]
    pub fn status_message(&self) -> String {
        self.access_url
            .as_ref()
            .map_or_else(|| "✅ Ready!".to_string(), |url| format!("✅ Listening on {url}"))
    }
}

/// Engine-specific behaviour for one run.
#[derive(Clone)]
pub enum BackendController {
    LlamaCpp(LlamaCppBackend),
    TabbyApi(TabbyApiBackend),
}

impl BackendController {
    /// Controller for `kind`, configured from a snapshot of `settings`.
    pub fn for_kind(kind: BackendKind, settings: &Settings, gguf: Arc<dyn GgufReaderPort>) -> Self {
        let extra_paths = settings.general.extra_paths.clone();
        match kind {
            BackendKind::LlamaCpp => {
                Self::LlamaCpp(LlamaCppBackend::new(settings.llamacpp.clone(), extra_paths, gguf))
            }
            BackendKind::TabbyApi => {
                Self::TabbyApi(TabbyApiBackend::new(settings.tabbyapi.clone(), extra_paths))
            }
        }
    }

    /// Whether models for `kind` should be listed with these settings.
    #[must_use]
    pub fn is_available(kind: BackendKind, settings: &Settings) -> bool {
        match kind {
            BackendKind::LlamaCpp => !settings.llamacpp.executable.trim().is_empty(),
            BackendKind::TabbyApi => settings
                .tabbyapi
                .install_dir
                .as_deref()
                .is_some_and(|dir| !dir.trim().is_empty()),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> BackendKind {
        match self {
            Self::LlamaCpp(_) => BackendKind::LlamaCpp,
            Self::TabbyApi(_) => BackendKind::TabbyApi,
        }
    }

    pub fn build_command(&self, entry: &ModelEntry) -> Result<LaunchCommand, LaunchError> {
        match self {
            Self::LlamaCpp(backend) => backend.build_command(entry),
            Self::TabbyApi(backend) => backend.build_command(entry),
        }
    }

    #[must_use]
    pub fn telemetry_parser(&self) -> TelemetryParser {
        TelemetryParser::for_backend(self.kind())
    }

    /// How long request stats are kept for this engine.
    #[must_use]
    pub const fn telemetry_retention(&self) -> Duration {
        let secs = match self {
            Self::LlamaCpp(backend) => backend.settings().telemetry_retention_secs,
            Self::TabbyApi(backend) => backend.settings().telemetry_retention_secs,
        };
        Duration::from_secs(secs)
    }

    /// Start the reader task for a freshly spawned child.
    pub fn create_log_reader<O, E>(
        &self,
        stdout: O,
        stderr: E,
        queue: UnboundedSender<LogLine>,
        telemetry: Arc<Mutex<TelemetryWindow>>,
        sink: Arc<dyn LogSinkPort>,
    ) -> StreamingLogReader
    where
        O: AsyncRead + Unpin + Send + 'static,
        E: AsyncRead + Unpin + Send + 'static,
    {
        StreamingLogReader::spawn(stdout, stderr, queue, self.telemetry_parser(), telemetry, sink)
    }

    /// Ready signal carried by `line`, if any.
    #[must_use]
    pub fn ready_signal(&self, line: &str) -> Option<ReadySignal> {
        let ready = match self {
            Self::LlamaCpp(_) => LlamaCppBackend::is_ready_line(line),
            Self::TabbyApi(_) => TabbyApiBackend::is_ready_line(line),
        };
        ready.then(|| ReadySignal {
            access_url: access_url(line),
        })
    }

    /// Version details from the aggregated startup log.
    pub async fn on_startup_complete(&self, startup_log: &str) -> BuildInfo {
        match self {
            Self::LlamaCpp(_) => LlamaCppBackend::build_info(startup_log),
            Self::TabbyApi(backend) => backend.build_info(startup_log).await,
        }
    }

    /// Model metadata, or a placeholder explaining why it is missing.
    ///
    /// Reads files synchronously; call from a blocking context.
    pub fn read_model_metadata(&self, entry: &ModelEntry) -> ModelInfo {
        let result: Result<ModelInfo, MetadataError> = match self {
            Self::LlamaCpp(backend) => backend.read_model_metadata(entry),
            Self::TabbyApi(_) => TabbyApiBackend::read_model_metadata(entry),
        };
        result.unwrap_or_else(|e| {
            warn!(model = %entry.label(), error = %e, "could not read model metadata");
            ModelInfo::placeholder(format!("Could not read model metadata: {e}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lmlaunch_core::{GgufHeader, GgufParseError};
    use std::path::Path;

    struct MissingGguf;

    impl GgufReaderPort for MissingGguf {
        fn read_header(&self, path: &Path) -> Result<GgufHeader, GgufParseError> {
            Err(GgufParseError::NotFound(path.display().to_string()))
        }
    }

    fn controller(kind: BackendKind) -> BackendController {
        BackendController::for_kind(kind, &Settings::with_defaults(), Arc::new(MissingGguf))
    }

    #[test]
    fn variant_per_kind() {
        for kind in BackendKind::ALL {
            assert_eq!(controller(kind).kind(), kind);
        }
        assert_eq!(
            controller(BackendKind::LlamaCpp).telemetry_retention(),
            Duration::from_secs(600)
        );
        assert_eq!(
            controller(BackendKind::TabbyApi).telemetry_retention(),
            Duration::from_secs(1800)
        );
    }

    #[test]
    fn availability() {
        let mut settings = Settings::with_defaults();
        assert!(BackendController::is_available(BackendKind::LlamaCpp, &settings));
        assert!(!BackendController::is_available(BackendKind::TabbyApi, &settings));
        settings.tabbyapi.install_dir = Some("/opt/tabbyAPI".into());
        assert!(BackendController::is_available(BackendKind::TabbyApi, &settings));
    }

    #[test]
    fn ready_signal_per_engine() {
        let llama = controller(BackendKind::LlamaCpp);
        let signal = llama
            .ready_signal("main: server is listening on http://127.0.0.1:8080 - starting the main loop")
            .unwrap();
        assert_eq!(signal.access_url.as_deref(), Some("http://127.0.0.1:8080"));
        assert_eq!(signal.status_message(), "✅ Listening on http://127.0.0.1:8080");
        assert!(llama.ready_signal("INFO:     Uvicorn running on http://1.2.3.4:5000").is_none());

        let tabby = controller(BackendKind::TabbyApi);
        assert!(tabby.ready_signal("Uvicorn running on").is_some());
        assert_eq!(
            ReadySignal { access_url: None }.status_message(),
            "✅ Ready!"
        );
    }

    #[test]
    fn metadata_failure_degrades_to_placeholder() {
        let entry = ModelEntry::new("gone.gguf", "/nonexistent", BackendKind::LlamaCpp);
        let info = controller(BackendKind::LlamaCpp).read_model_metadata(&entry);
        assert_eq!(info.architecture, lmlaunch_core::UNKNOWN_ARCHITECTURE);
        assert_eq!(info.notes.len(), 1);
        assert!(info.notes[0].starts_with("Could not read model metadata"));
    }
}
