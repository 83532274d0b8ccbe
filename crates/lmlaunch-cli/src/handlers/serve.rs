//! Serve command handler.
//!
//! Starts the selected model under supervision and reports state changes
//! and periodic telemetry until Ctrl+C, then stops the server.

use std::time::Duration;

use anyhow::Result;
use lmlaunch_core::SupervisorState;
use lmlaunch_runtime::{Launcher, STATUS_NO_MODEL};
use tokio::sync::broadcast::error::RecvError;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::bootstrap::CliContext;
use crate::error::CliError;
use crate::presentation::{format_errors, format_status, format_telemetry};

/// How often the run task's liveness is checked.
const LIVENESS_INTERVAL: Duration = Duration::from_secs(1);

/// Execute the serve command.
///
/// `model` replaces the configured model for this run only; the settings
/// file is not touched.
pub async fn execute(
    ctx: &CliContext,
    model: Option<String>,
    stats_interval: Duration,
) -> Result<()> {
    let launcher = ctx.launcher();
    if let Some(label) = model {
        let mut settings = launcher.settings();
        settings.general.model = Some(label);
        launcher.apply_settings(settings).map_err(CliError::from)?;
    }

    // subscribed first so the launch transition is printed too
    let mut events = launcher.events();
    let status = launcher.start().await;
    if !launcher.is_running() {
        println!("{status}");
        return Err(start_refused(status).into());
    }
    println!("Press Ctrl+C to stop");

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut liveness = tokio::time::interval(LIVENESS_INTERVAL);
    liveness.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut stats = tokio::time::interval_at(
        tokio::time::Instant::now() + stats_interval,
        stats_interval.max(LIVENESS_INTERVAL),
    );
    stats.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_reported = None;

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            event = events.recv() => match event {
                Ok(update) => println!("{}", format_status(update.state, &update.message)),
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "status output fell behind"),
                Err(RecvError::Closed) => break,
            },
            _ = stats.tick() => {
                let snapshot = launcher.telemetry();
                if snapshot.request_count > 0 && last_reported.as_ref() != Some(&snapshot) {
                    println!("{}", format_telemetry(&snapshot));
                    last_reported = Some(snapshot);
                }
            }
            _ = liveness.tick() => {
                if !launcher.is_running() {
                    return Err(CliError::Process(launcher.status()).into());
                }
            }
        }
    }

    shutdown(launcher).await;
    Ok(())
}

/// Why `start` did not produce a run.
fn start_refused(status: String) -> CliError {
    if status == STATUS_NO_MODEL || status.contains("not found") {
        CliError::Arguments(status)
    } else {
        CliError::Process(status)
    }
}

async fn shutdown(launcher: &Launcher) {
    println!("\nStopping...");
    let status = launcher.stop().await;
    debug!(state = %launcher.state(), "serve finished");
    println!("{}", format_status(launcher.state(), &status));

    let snapshot = launcher.telemetry();
    if snapshot.request_count > 0 {
        println!("{}", format_telemetry(&snapshot));
    }
    let restarts = launcher.restarts();
    if restarts > 0 {
        println!("Server restarted {restarts} time(s). Recent errors:");
        print!("{}", format_errors(&launcher.recent_errors()));
    }
    if launcher.state() != SupervisorState::Stopped {
        warn!(state = %launcher.state(), "server did not reach stopped state");
    }
}
