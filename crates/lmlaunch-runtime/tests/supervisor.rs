//! Supervisor lifecycle against scripted fake servers.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use lmlaunch_core::{
    BackendKind, GgufHeader, GgufParseError, GgufReaderPort, ModelEntry, NoopLogSink, Settings,
    SupervisorState,
};
use lmlaunch_runtime::process::{STATUS_EXITED_EARLY, STATUS_STOPPED, STATUS_TIMED_OUT};
use lmlaunch_runtime::{BackendController, ProcessSupervisor, StatusUpdate, SupervisorConfig};
use tempfile::TempDir;
use tokio::sync::{Mutex, broadcast};

/// Tests spawn processes; running them one at a time keeps freshly written
/// scripts from being inherited, still open, by a concurrent fork.
static SERIAL: Mutex<()> = Mutex::const_new(());

const READY_SERVER: &str = r#"exec 1>&2
echo "build: 4520 (abc1234) with cc (GCC) 13.2.0 for x86_64-linux-gnu"
echo "llama_model_loader: loaded meta data"
echo "main: server is listening on http://127.0.0.1:8080 - starting the main loop"
echo "prompt eval time =     120.00 ms /    50 tokens"
echo "       eval time =     900.00 ms /    80 tokens"
exec sleep 30"#;

struct NoGguf;

impl GgufReaderPort for NoGguf {
    fn read_header(&self, path: &Path) -> Result<GgufHeader, GgufParseError> {
        Err(GgufParseError::InvalidFormat(path.display().to_string()))
    }
}

struct Fixture {
    _dir: TempDir,
    backend: BackendController,
    entry: ModelEntry,
}

fn fixture(script: &str) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let server = dir.path().join("fake-server");
    fs::write(&server, format!("#!/bin/sh\n{script}\n")).unwrap();
    fs::set_permissions(&server, fs::Permissions::from_mode(0o755)).unwrap();
    fs::write(dir.path().join("model.gguf"), b"GGUF").unwrap();

    let mut settings = Settings::with_defaults();
    settings.llamacpp.executable = server.to_string_lossy().into_owned();
    let backend =
        BackendController::for_kind(BackendKind::LlamaCpp, &settings, Arc::new(NoGguf));
    let entry = ModelEntry::new("model.gguf", dir.path(), BackendKind::LlamaCpp);
    Fixture {
        _dir: dir,
        backend,
        entry,
    }
}

fn config() -> SupervisorConfig {
    SupervisorConfig {
        startup_timeout: Duration::from_secs(5),
        restart_delay: Duration::from_millis(100),
        stop_timeout: Duration::from_secs(2),
        poll_interval: Duration::from_millis(20),
    }
}

fn start(supervisor: &ProcessSupervisor, fixture: &Fixture, config: SupervisorConfig) {
    assert!(supervisor.run(
        fixture.backend.clone(),
        fixture.entry.clone(),
        config,
        Arc::new(NoopLogSink),
    ));
}

async fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    cond()
}

/// Transitions received so far.
fn drain(events: &mut broadcast::Receiver<StatusUpdate>) -> Vec<StatusUpdate> {
    std::iter::from_fn(|| events.try_recv().ok()).collect()
}

fn states(updates: &[StatusUpdate]) -> Vec<SupervisorState> {
    updates.iter().map(|u| u.state).collect()
}

fn has_error(supervisor: &ProcessSupervisor, needle: &str) -> bool {
    supervisor
        .recent_errors()
        .iter()
        .any(|e| e.message.contains(needle))
}

#[tokio::test]
async fn ready_server_reports_url_build_and_telemetry() {
    let _serial = SERIAL.lock().await;
    let fixture = fixture(READY_SERVER);
    let supervisor = ProcessSupervisor::new();
    let mut updates = supervisor.subscribe();
    let mut events = supervisor.events();
    start(&supervisor, &fixture, config());

    assert!(wait_until(|| supervisor.state() == SupervisorState::Ready).await);
    assert_eq!(supervisor.status(), "✅ Listening on http://127.0.0.1:8080");
    assert_eq!(supervisor.access_url().as_deref(), Some("http://127.0.0.1:8080"));
    assert!(supervisor.startup_log().contains("llama_model_loader"));
    assert!(supervisor.commandline().contains("--alias model"));

    let build = supervisor.build_info().unwrap();
    assert_eq!(build.version.as_deref(), Some("4520"));
    assert_eq!(build.commit.as_deref(), Some("abc1234"));

    assert!(wait_until(|| supervisor.telemetry().request_count == 1).await);
    let telemetry = supervisor.telemetry();
    assert_eq!(telemetry.tokens_generated, 80);
    assert_eq!(telemetry.tokens_processed, 50);

    assert!(updates.has_changed().unwrap());
    assert_eq!(updates.borrow_and_update().state, SupervisorState::Ready);
    assert_eq!(
        states(&drain(&mut events)),
        [
            SupervisorState::Starting,
            SupervisorState::WaitingReady,
            SupervisorState::Ready,
        ]
    );

    supervisor.stop().await;
    assert_eq!(supervisor.state(), SupervisorState::Stopped);
    assert_eq!(supervisor.status(), STATUS_STOPPED);
    assert_eq!(supervisor.restarts(), 0);
    assert!(!supervisor.is_running());

    assert_eq!(
        states(&drain(&mut events)),
        [SupervisorState::Stopping, SupervisorState::Stopped]
    );

    // second stop changes nothing
    supervisor.stop().await;
    assert_eq!(supervisor.state(), SupervisorState::Stopped);
    assert!(drain(&mut events).is_empty());
}

#[tokio::test]
async fn early_exit_restarts_until_stopped() {
    let _serial = SERIAL.lock().await;
    let fixture = fixture("echo loading\nexit 3");
    let supervisor = ProcessSupervisor::new();
    start(&supervisor, &fixture, config());

    assert!(wait_until(|| supervisor.restarts() >= 3).await);
    // every attempt failed the same way, so the log holds a single entry
    let errors = supervisor.recent_errors();
    assert_eq!(errors.len(), 1, "{errors:?}");
    assert!(errors[0].message.starts_with(STATUS_EXITED_EARLY));
    assert!(errors[0].message.ends_with("exited with code 3; restarting"));

    let started = Instant::now();
    supervisor.stop().await;
    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(supervisor.state(), SupervisorState::Stopped);

    let restarts = supervisor.restarts();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(supervisor.restarts(), restarts);
}

#[tokio::test]
async fn silent_server_times_out() {
    let _serial = SERIAL.lock().await;
    let fixture = fixture("exec sleep 30");
    let supervisor = ProcessSupervisor::new();
    let mut events = supervisor.events();
    let config = SupervisorConfig {
        startup_timeout: Duration::from_millis(300),
        restart_delay: Duration::from_secs(30),
        ..config()
    };
    start(&supervisor, &fixture, config);

    assert!(
        wait_until(|| supervisor.restarts() == 1 && !supervisor.recent_errors().is_empty()).await
    );
    assert_eq!(supervisor.state(), SupervisorState::Failed);
    assert_eq!(supervisor.status(), STATUS_TIMED_OUT);
    assert!(supervisor.startup_log().ends_with("\nTimed out."));
    assert!(has_error(&supervisor, STATUS_TIMED_OUT));
    assert_eq!(supervisor.recent_errors().len(), 1);

    let seen = drain(&mut events);
    assert_eq!(
        states(&seen),
        [
            SupervisorState::Starting,
            SupervisorState::WaitingReady,
            SupervisorState::Failed,
        ]
    );
    assert_eq!(seen[2].message, STATUS_TIMED_OUT);

    // stop interrupts the restart delay
    let started = Instant::now();
    supervisor.stop().await;
    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(supervisor.state(), SupervisorState::Stopped);
    assert_eq!(states(&drain(&mut events)), [SupervisorState::Stopped]);
}

#[tokio::test]
async fn crash_after_ready_restarts() {
    let _serial = SERIAL.lock().await;
    let fixture = fixture(
        "echo 'main: server is listening on http://127.0.0.1:9 - starting the main loop'\nsleep 0.3\nexit 7",
    );
    let supervisor = ProcessSupervisor::new();
    start(&supervisor, &fixture, config());

    assert!(wait_until(|| supervisor.restarts() >= 1).await);
    assert!(has_error(&supervisor, "exited with code 7; restarting"));
    supervisor.stop().await;
    assert_eq!(supervisor.state(), SupervisorState::Stopped);
}

#[tokio::test]
async fn missing_executable_is_terminal() {
    let _serial = SERIAL.lock().await;
    let mut fixture = fixture("exit 0");
    let mut settings = Settings::with_defaults();
    settings.llamacpp.executable = "/nonexistent/llama-server".to_string();
    fixture.backend =
        BackendController::for_kind(BackendKind::LlamaCpp, &settings, Arc::new(NoGguf));

    let supervisor = ProcessSupervisor::new();
    start(&supervisor, &fixture, config());

    assert!(wait_until(|| !supervisor.is_running()).await);
    assert_eq!(supervisor.state(), SupervisorState::Failed);
    assert!(supervisor.status().starts_with("❌ Configuration error:"));
    assert_eq!(supervisor.restarts(), 0);

    supervisor.stop().await;
    assert_eq!(supervisor.state(), SupervisorState::Stopped);
}

#[tokio::test]
async fn stop_while_waiting_for_ready() {
    let _serial = SERIAL.lock().await;
    let fixture = fixture("echo loading\nexec sleep 30");
    let supervisor = ProcessSupervisor::new();
    start(&supervisor, &fixture, config());

    assert!(wait_until(|| supervisor.startup_log().contains("loading")).await);
    assert_eq!(supervisor.state(), SupervisorState::WaitingReady);
    assert!(!supervisor.run(
        fixture.backend.clone(),
        fixture.entry.clone(),
        config(),
        Arc::new(NoopLogSink)
    ));

    let started = Instant::now();
    supervisor.stop().await;
    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(supervisor.state(), SupervisorState::Stopped);
}
