//! Supervisor lifecycle states.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of the supervised backend process.
///
/// ```text
/// Idle -> Starting -> WaitingReady -> Ready
///                          |            |
///                          v            v (unexpected exit)
///                        Failed ----> Starting
/// any --stop()--> Stopping -> Stopped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupervisorState {
    /// Nothing has been started yet.
    Idle,
    /// Building the command and spawning the process.
    Starting,
    /// Process is running; watching its output for the ready line.
    WaitingReady,
    /// Ready line seen; serving requests.
    Ready,
    /// Startup failed or the process died. Restarts unless the failure is
    /// a configuration error.
    Failed,
    /// Stop requested; terminating the process.
    Stopping,
    /// Stopped on request. Terminal until the next start.
    Stopped,
}

impl SupervisorState {
    /// True while a run is in progress (a process exists or is about to).
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(
            self,
            Self::Starting | Self::WaitingReady | Self::Ready | Self::Failed
        )
    }

    /// True when no process exists and none will be started without a new
    /// `start()`.
    #[must_use]
    pub const fn is_inactive(self) -> bool {
        matches!(self, Self::Idle | Self::Stopped)
    }
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::WaitingReady => "waiting_ready",
            Self::Ready => "ready",
            Self::Failed => "failed",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        };
        f.write_str(s)
    }
}
