//! Backend process supervisor.
//!
//! The [`ProcessSupervisor`] owns one run at a time. A run is a tokio task
//! that spawns the backend, waits for it to become ready, watches it, and
//! restarts it after unexpected exits until [`ProcessSupervisor::stop`] is
//! called. Callers only read snapshots of the shared state; the task is the
//! only writer.
//!
//! Configuration errors (the command cannot be built or spawned) end the
//! run in [`SupervisorState::Failed`] without a restart, since retrying
//! would fail the same way.

use std::fmt;
use std::process::ExitStatus;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use lmlaunch_core::{
    BuildInfo, ErrorLog, ErrorRecord, GeneralSettings, LaunchError, LogSinkPort, ModelEntry,
    SupervisorState, TelemetrySnapshot, TelemetryWindow,
};
use tokio::process::Child;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::readiness::{Readiness, wait_for_ready};
use super::shutdown::terminate_child;
use super::stream::{LogLine, StreamingLogReader};
use crate::backend::BackendController;

pub const STATUS_NOT_STARTED: &str = "Not started";
pub const STATUS_LAUNCHING: &str = "Launching server process.";
pub const STATUS_WAITING: &str = "Waiting for server to start...";
pub const STATUS_EXITED_EARLY: &str = "❌ Server exited before it was ready.";
pub const STATUS_TIMED_OUT: &str = "❌ Timed out waiting for output from server.";
pub const STATUS_STOPPING: &str = "Stopping server...";
pub const STATUS_STOPPED: &str = "✋🏻 Stopped by user.";

/// How long the reader may keep draining pipes after its child is gone.
const READER_DRAIN_GRACE: Duration = Duration::from_secs(1);

/// Buffered transitions per [`ProcessSupervisor::events`] receiver.
const EVENT_CAPACITY: usize = 64;

/// Extra time `stop()` allows the run task beyond the SIGTERM grace period.
const STOP_SLACK: Duration = Duration::from_secs(5);

/// Timing knobs for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorConfig {
    /// Output inactivity after which startup is considered hung.
    pub startup_timeout: Duration,
    pub restart_delay: Duration,
    /// Grace period between SIGTERM and SIGKILL.
    pub stop_timeout: Duration,
    /// Readiness loop polling period.
    pub poll_interval: Duration,
}

impl SupervisorConfig {
    #[must_use]
    pub const fn from_settings(general: &GeneralSettings) -> Self {
        Self {
            startup_timeout: general.startup_timeout(),
            restart_delay: general.restart_delay(),
            stop_timeout: general.stop_timeout(),
            poll_interval: general.poll_interval(),
        }
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self::from_settings(&GeneralSettings::default())
    }
}

/// A state change, as published to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub state: SupervisorState,
    pub message: String,
}

struct Shared {
    state: RwLock<SupervisorState>,
    status: RwLock<String>,
    startup_log: RwLock<String>,
    commandline: RwLock<String>,
    build_info: RwLock<Option<BuildInfo>>,
    access_url: RwLock<Option<String>>,
    restarts: AtomicU32,
    errors: Mutex<ErrorLog>,
    updates: watch::Sender<StatusUpdate>,
    events: broadcast::Sender<StatusUpdate>,
}

fn read<T: Clone>(lock: &RwLock<T>) -> T {
    lock.read().unwrap_or_else(PoisonError::into_inner).clone()
}

fn write<T>(lock: &RwLock<T>, value: T) {
    *lock.write().unwrap_or_else(PoisonError::into_inner) = value;
}

impl Shared {
    fn new() -> Self {
        let (updates, _) = watch::channel(StatusUpdate {
            state: SupervisorState::Idle,
            message: STATUS_NOT_STARTED.to_string(),
        });
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: RwLock::new(SupervisorState::Idle),
            status: RwLock::new(STATUS_NOT_STARTED.to_string()),
            startup_log: RwLock::new(String::new()),
            commandline: RwLock::new(String::new()),
            build_info: RwLock::new(None),
            access_url: RwLock::new(None),
            restarts: AtomicU32::new(0),
            errors: Mutex::new(ErrorLog::new()),
            updates,
            events,
        }
    }

    fn set(&self, state: SupervisorState, message: impl Into<String>) {
        let message = message.into();
        info!(%state, "{message}");
        write(&self.state, state);
        write(&self.status, message.clone());
        let update = StatusUpdate { state, message };
        if self.events.receiver_count() > 0 {
            let _ = self.events.send(update.clone());
        }
        self.updates.send_replace(update);
    }

    fn record_error(&self, message: String) {
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(message);
    }

    /// Enter `Failed` and remember the message as a recent error.
    fn fail(&self, message: impl Into<String>) {
        let message = message.into();
        self.record_error(message.clone());
        self.set(SupervisorState::Failed, message);
    }

    fn append_log(&self, text: &str) {
        self.startup_log
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push_str(text);
    }

    fn reset_for_run(&self) {
        write(&self.startup_log, String::new());
        write(&self.commandline, String::new());
        write(&self.build_info, None);
        write(&self.access_url, None);
        self.restarts.store(0, Ordering::Relaxed);
    }
}

struct RunHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
    stop_timeout: Duration,
}

/// Supervises at most one backend process.
pub struct ProcessSupervisor {
    shared: Arc<Shared>,
    telemetry: Arc<Mutex<TelemetryWindow>>,
    run: Mutex<Option<RunHandle>>,
}

impl Default for ProcessSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ProcessSupervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessSupervisor")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl ProcessSupervisor {
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared::new()),
            telemetry: Arc::new(Mutex::new(TelemetryWindow::new(Duration::from_secs(600)))),
            run: Mutex::new(None),
        }
    }

    /// Start supervising `entry` on a background task.
    ///
    /// Returns `false` without doing anything while a previous run task is
    /// still alive. Must be called from within a tokio runtime.
    pub fn run(
        &self,
        backend: BackendController,
        entry: ModelEntry,
        config: SupervisorConfig,
        sink: Arc<dyn LogSinkPort>,
    ) -> bool {
        let mut slot = self.run.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|run| !run.task.is_finished()) {
            return false;
        }

        self.shared.reset_for_run();
        {
            let mut window = self.telemetry.lock().unwrap_or_else(PoisonError::into_inner);
            window.clear();
            window.set_retention(backend.telemetry_retention());
        }
        self.shared.set(SupervisorState::Starting, STATUS_LAUNCHING);

        let cancel = CancellationToken::new();
        let run = Run {
            shared: Arc::clone(&self.shared),
            telemetry: Arc::clone(&self.telemetry),
            backend,
            entry,
            config,
            sink,
            cancel: cancel.clone(),
        };
        *slot = Some(RunHandle {
            cancel,
            task: tokio::spawn(run.supervise()),
            stop_timeout: config.stop_timeout,
        });
        true
    }

    /// Stop the current run and wait for the process to be reaped.
    ///
    /// Idempotent: without a run (idle, or already stopped) this returns
    /// immediately and changes nothing.
    pub async fn stop(&self) {
        let handle = self.run.lock().unwrap_or_else(PoisonError::into_inner).take();
        let Some(RunHandle {
            cancel,
            mut task,
            stop_timeout,
        }) = handle
        else {
            return;
        };

        if task.is_finished() {
            // Ended on a configuration error; nothing left to terminate.
            self.shared.set(SupervisorState::Stopped, STATUS_STOPPED);
            return;
        }

        cancel.cancel();
        match tokio::time::timeout(stop_timeout + STOP_SLACK, &mut task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(error = %e, "supervisor task failed"),
            Err(_) => {
                warn!("supervisor task did not finish in time, aborting");
                task.abort();
                self.shared.set(SupervisorState::Stopped, STATUS_STOPPED);
            }
        }
    }

    /// True while a run task is alive.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.run
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|run| !run.task.is_finished())
    }

    #[must_use]
    pub fn state(&self) -> SupervisorState {
        read(&self.shared.state)
    }

    #[must_use]
    pub fn status(&self) -> String {
        read(&self.shared.status)
    }

    /// Output collected while waiting for readiness.
    #[must_use]
    pub fn startup_log(&self) -> String {
        read(&self.shared.startup_log)
    }

    #[must_use]
    pub fn commandline(&self) -> String {
        read(&self.shared.commandline)
    }

    #[must_use]
    pub fn build_info(&self) -> Option<BuildInfo> {
        read(&self.shared.build_info)
    }

    #[must_use]
    pub fn access_url(&self) -> Option<String> {
        read(&self.shared.access_url)
    }

    /// Automatic restarts in the current run.
    #[must_use]
    pub fn restarts(&self) -> u32 {
        self.shared.restarts.load(Ordering::Relaxed)
    }

    /// Recent distinct errors, newest first.
    #[must_use]
    pub fn recent_errors(&self) -> Vec<ErrorRecord> {
        self.shared
            .errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .recent()
    }

    #[must_use]
    pub fn telemetry(&self) -> TelemetrySnapshot {
        self.telemetry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .snapshot()
    }

    /// Receiver for state changes; starts with the current state.
    ///
    /// Only the latest value is kept. Use [`Self::events`] to observe every
    /// transition.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<StatusUpdate> {
        self.shared.updates.subscribe()
    }

    /// Receiver for every transition from now on, in order.
    ///
    /// A receiver that falls more than a few dozen transitions behind gets
    /// `RecvError::Lagged` and skips the oldest ones.
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<StatusUpdate> {
        self.shared.events.subscribe()
    }
}

/// How one process attempt ended.
enum AttemptEnd {
    /// The process is gone; restart after the delay.
    Exited(Option<ExitStatus>),
    /// Stop requested; the process is still ours to terminate.
    Cancelled,
}

/// Everything the run task owns.
struct Run {
    shared: Arc<Shared>,
    telemetry: Arc<Mutex<TelemetryWindow>>,
    backend: BackendController,
    entry: ModelEntry,
    config: SupervisorConfig,
    sink: Arc<dyn LogSinkPort>,
    cancel: CancellationToken,
}

impl Run {
    async fn supervise(self) {
        let model = self.entry.label();
        loop {
            let command = match self.backend.build_command(&self.entry) {
                Ok(command) => command,
                Err(e) => return self.config_error(&e),
            };
            let commandline = command.display();
            info!(model = %model, command = %commandline, "launching backend");
            write(&self.shared.commandline, commandline);
            write(&self.shared.startup_log, String::new());

            let mut child = match command.to_command().spawn() {
                Ok(child) => child,
                Err(e) => {
                    return self.config_error(&LaunchError::Spawn {
                        program: command.program.display().to_string(),
                        reason: e.to_string(),
                    });
                }
            };
            let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
                return self.config_error(&LaunchError::Spawn {
                    program: command.program.display().to_string(),
                    reason: "output pipes unavailable".to_string(),
                });
            };
            debug!(pid = ?child.id(), "backend spawned");

            let (tx, rx) = mpsc::unbounded_channel();
            let reader = self.backend.create_log_reader(
                stdout,
                stderr,
                tx,
                Arc::clone(&self.telemetry),
                Arc::clone(&self.sink),
            );

            let end = self.attempt(&mut child, rx).await;
            let status = match end {
                AttemptEnd::Cancelled => {
                    self.shutdown(&mut child, reader).await;
                    return;
                }
                AttemptEnd::Exited(status) => status,
            };
            reader.join(READER_DRAIN_GRACE).await;

            if self.cancel.is_cancelled() {
                if read(&self.shared.state) == SupervisorState::Failed {
                    self.shared.record_error(read(&self.shared.status));
                }
                self.shared.set(SupervisorState::Stopped, STATUS_STOPPED);
                return;
            }

            let restarts = self.shared.restarts.fetch_add(1, Ordering::Relaxed) + 1;
            let message = format!(
                "Server process exited with code {}; restarting",
                describe_exit(status)
            );
            warn!(model = %model, restarts, "{message}");
            if read(&self.shared.state) == SupervisorState::Failed {
                // one record per attempt, joined with the startup failure
                let status = read(&self.shared.status);
                self.shared.record_error(format!("{status} {message}"));
            } else {
                self.shared.fail(message);
            }

            tokio::select! {
                () = self.cancel.cancelled() => {
                    self.shared.set(SupervisorState::Stopped, STATUS_STOPPED);
                    return;
                }
                () = tokio::time::sleep(self.config.restart_delay) => {}
            }
            self.shared.set(SupervisorState::Starting, STATUS_LAUNCHING);
        }
    }

    /// Wait for readiness, then for the process to exit.
    async fn attempt(
        &self,
        child: &mut Child,
        mut rx: mpsc::UnboundedReceiver<LogLine>,
    ) -> AttemptEnd {
        self.shared.set(SupervisorState::WaitingReady, STATUS_WAITING);

        let shared = &self.shared;
        let readiness = wait_for_ready(
            &self.backend,
            child,
            &mut rx,
            self.config.poll_interval,
            self.config.startup_timeout,
            &self.cancel,
            |line| {
                shared.append_log(line);
                shared.append_log("\n");
            },
        )
        .await;
        drop(rx);

        match readiness {
            Readiness::Cancelled => AttemptEnd::Cancelled,
            Readiness::Exited(status) => {
                self.shared.set(SupervisorState::Failed, STATUS_EXITED_EARLY);
                AttemptEnd::Exited(status)
            }
            Readiness::TimedOut => {
                self.shared.append_log("\nTimed out.");
                self.shared.set(SupervisorState::Failed, STATUS_TIMED_OUT);
                let status = terminate_child(child, self.config.stop_timeout)
                    .await
                    .inspect_err(|e| warn!(error = %e, "failed to terminate hung backend"))
                    .ok();
                AttemptEnd::Exited(status)
            }
            Readiness::Ready(signal) => {
                let log = read(&self.shared.startup_log);
                let build = self.backend.on_startup_complete(&log).await;
                info!(build = %build, "backend ready");
                write(&self.shared.build_info, Some(build));
                write(&self.shared.access_url, signal.access_url.clone());
                self.shared.set(SupervisorState::Ready, signal.status_message());

                tokio::select! {
                    () = self.cancel.cancelled() => AttemptEnd::Cancelled,
                    status = child.wait() => AttemptEnd::Exited(status.ok()),
                }
            }
        }
    }

    async fn shutdown(&self, child: &mut Child, reader: StreamingLogReader) {
        self.shared.set(SupervisorState::Stopping, STATUS_STOPPING);
        match terminate_child(child, self.config.stop_timeout).await {
            Ok(status) => debug!(status = %status, "backend stopped"),
            Err(e) => warn!(error = %e, "failed to stop backend"),
        }
        reader.join(READER_DRAIN_GRACE).await;
        self.shared.set(SupervisorState::Stopped, STATUS_STOPPED);
    }

    fn config_error(&self, e: &LaunchError) {
        error!(model = %self.entry.label(), error = %e, "backend cannot be launched");
        self.shared.fail(format!("❌ Configuration error: {e}"));
    }
}

fn describe_exit(status: Option<ExitStatus>) -> String {
    match status.map(|s| s.code()) {
        Some(Some(code)) => code.to_string(),
        Some(None) => "none (killed by signal)".to_string(),
        None => "unknown".to_string(),
    }
}
