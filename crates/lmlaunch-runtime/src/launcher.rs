//! Launcher facade.
//!
//! The [`Launcher`] is what front-ends talk to. It keeps the settings and
//! the model catalog, reads model metadata, and drives a single
//! [`ProcessSupervisor`]. All accessors are synchronous snapshots; only
//! `start` and `stop` await.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use lmlaunch_core::{
    BackendKind, BuildInfo, ErrorRecord, GgufReaderPort, LogSinkPort, ModelEntry, ModelInfo,
    PathError, Settings, SettingsError, SupervisorState, TelemetrySnapshot, resolve_model_dir,
    scan_models, validate_settings,
};
use tokio::sync::{broadcast, watch};
use tracing::{info, warn};

use crate::backend::BackendController;
use crate::process::{ProcessSupervisor, StatusUpdate, SupervisorConfig};

pub const STATUS_BUSY: &str = "Already working!";
pub const STATUS_NO_MODEL: &str = "Model not selected.";

/// Scope guard that clears the busy flag on drop.
struct BusyGuard<'a> {
    busy: &'a AtomicBool,
}

impl<'a> BusyGuard<'a> {
    /// `None` when another start or stop is in progress.
    fn try_acquire(busy: &'a AtomicBool) -> Option<Self> {
        busy.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self { busy })
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::SeqCst);
    }
}

/// Coordinates settings, the model catalog and the supervisor.
pub struct Launcher {
    settings: RwLock<Settings>,
    models: RwLock<Vec<ModelEntry>>,
    model_info: RwLock<Option<Arc<ModelInfo>>>,
    supervisor: ProcessSupervisor,
    gguf: Arc<dyn GgufReaderPort>,
    sink: Arc<dyn LogSinkPort>,
    busy: AtomicBool,
}

impl Launcher {
    pub fn new(
        settings: Settings,
        gguf: Arc<dyn GgufReaderPort>,
        sink: Arc<dyn LogSinkPort>,
    ) -> Self {
        Self {
            settings: RwLock::new(settings),
            models: RwLock::new(Vec::new()),
            model_info: RwLock::new(None),
            supervisor: ProcessSupervisor::new(),
            gguf,
            sink,
            busy: AtomicBool::new(false),
        }
    }

    /// Start the selected model, replacing any current run.
    ///
    /// Returns the status to show: the supervisor's launch status, or why
    /// nothing was started.
    pub async fn start(&self) -> String {
        let Some(_guard) = BusyGuard::try_acquire(&self.busy) else {
            return STATUS_BUSY.to_string();
        };

        let settings = self.settings();
        let Some(label) = settings
            .general
            .model
            .clone()
            .filter(|label| !label.trim().is_empty())
        else {
            return STATUS_NO_MODEL.to_string();
        };

        if self.models().is_empty() {
            if let Err(e) = self.refresh_models() {
                warn!(error = %e, "model scan failed");
            }
        }
        let Some(entry) = self.find_model(&label) else {
            warn!(model = %label, "selected model is not in the catalog");
            return format!("❌ Model not found: {label}");
        };

        self.supervisor.stop().await;

        let backend = BackendController::for_kind(entry.kind, &settings, Arc::clone(&self.gguf));
        let info = {
            let backend = backend.clone();
            let entry = entry.clone();
            tokio::task::spawn_blocking(move || backend.read_model_metadata(&entry))
                .await
                .unwrap_or_else(|e| ModelInfo::placeholder(format!("Metadata reader failed: {e}")))
        };
        *self.model_info.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(info));

        info!(model = %label, "starting backend");
        self.supervisor.run(
            backend,
            entry,
            SupervisorConfig::from_settings(&settings.general),
            Arc::clone(&self.sink),
        );
        self.supervisor.status()
    }

    /// Stop the backend. Does nothing when nothing runs.
    pub async fn stop(&self) -> String {
        let Some(_guard) = BusyGuard::try_acquire(&self.busy) else {
            return STATUS_BUSY.to_string();
        };
        self.supervisor.stop().await;
        self.supervisor.status()
    }

    /// Start the selected model if configured to run at startup.
    ///
    /// Returns `None` when nothing was attempted.
    pub async fn launch_at_startup(&self) -> Option<String> {
        let general = self.settings().general;
        if !general.run_at_startup || general.model.as_deref().is_none_or(str::is_empty) {
            return None;
        }
        Some(self.start().await)
    }

    /// True while a supervisor run task is alive.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.supervisor.is_running()
    }

    #[must_use]
    pub fn status(&self) -> String {
        self.supervisor.status()
    }

    #[must_use]
    pub fn state(&self) -> SupervisorState {
        self.supervisor.state()
    }

    #[must_use]
    pub fn telemetry(&self) -> TelemetrySnapshot {
        self.supervisor.telemetry()
    }

    #[must_use]
    pub fn startup_log(&self) -> String {
        self.supervisor.startup_log()
    }

    #[must_use]
    pub fn commandline(&self) -> String {
        self.supervisor.commandline()
    }

    /// Metadata of the model of the current (or last) run.
    #[must_use]
    pub fn model_info(&self) -> Option<Arc<ModelInfo>> {
        self.model_info
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn build_info(&self) -> Option<BuildInfo> {
        self.supervisor.build_info()
    }

    #[must_use]
    pub fn access_url(&self) -> Option<String> {
        self.supervisor.access_url()
    }

    #[must_use]
    pub fn restarts(&self) -> u32 {
        self.supervisor.restarts()
    }

    #[must_use]
    pub fn recent_errors(&self) -> Vec<ErrorRecord> {
        self.supervisor.recent_errors()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<StatusUpdate> {
        self.supervisor.subscribe()
    }

    /// Every supervisor transition, in order.
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<StatusUpdate> {
        self.supervisor.events()
    }

    #[must_use]
    pub fn settings(&self) -> Settings {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Validate and replace the settings.
    ///
    /// Returns the dotted keys that changed. A running backend keeps its
    /// configuration until the next `start`. The catalog is rescanned when
    /// the model directory or an engine's availability changed.
    pub fn apply_settings(&self, new: Settings) -> Result<Vec<String>, SettingsError> {
        validate_settings(&new)?;
        let changed = {
            let mut current = self.settings.write().unwrap_or_else(PoisonError::into_inner);
            let changed = current.changed_keys(&new);
            *current = new;
            changed
        };

        let affects_catalog = changed.iter().any(|key| {
            matches!(
                key.as_str(),
                "general.model_dir" | "llamacpp.executable" | "tabbyapi.install_dir"
            )
        });
        if affects_catalog {
            if let Err(e) = self.refresh_models() {
                warn!(error = %e, "model scan failed after settings change");
            }
        }

        info!(changed = ?changed, "settings applied");
        Ok(changed)
    }

    /// Rescan the model directory. Returns the number of models found.
    pub fn refresh_models(&self) -> Result<usize, PathError> {
        let settings = self.settings();
        let dir = resolve_model_dir(&settings)?;
        let available: Vec<BackendKind> = BackendKind::ALL
            .into_iter()
            .filter(|kind| BackendController::is_available(*kind, &settings))
            .collect();

        let models = scan_models(&dir, &available)?;
        info!(dir = %dir.display(), count = models.len(), "model catalog refreshed");
        let count = models.len();
        *self.models.write().unwrap_or_else(PoisonError::into_inner) = models;
        Ok(count)
    }

    #[must_use]
    pub fn models(&self) -> Vec<ModelEntry> {
        self.models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn find_model(&self, label: &str) -> Option<ModelEntry> {
        self.models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|entry| entry.label() == label)
            .cloned()
    }

    /// Read metadata for any catalog entry without starting it.
    pub async fn inspect(&self, entry: &ModelEntry) -> ModelInfo {
        let backend =
            BackendController::for_kind(entry.kind, &self.settings(), Arc::clone(&self.gguf));
        let entry = entry.clone();
        tokio::task::spawn_blocking(move || backend.read_model_metadata(&entry))
            .await
            .unwrap_or_else(|e| ModelInfo::placeholder(format!("Metadata reader failed: {e}")))
    }
}
