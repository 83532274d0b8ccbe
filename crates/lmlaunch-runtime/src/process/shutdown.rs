//! Stopping a backend child: SIGTERM, a grace period, then SIGKILL.

use std::io;
use std::process::ExitStatus;
use std::time::Duration;

use tokio::process::Child;
use tokio::time::timeout;
use tracing::{debug, warn};

#[cfg(unix)]
use nix::sys::signal::{self, Signal};
#[cfg(unix)]
use nix::unistd::Pid;

/// Terminate `child` and reap it.
///
/// On Unix the child first gets SIGTERM and `grace` to exit on its own;
/// after that it is killed. Elsewhere it is killed straight away. A child
/// that already exited is simply reaped.
pub async fn terminate_child(child: &mut Child, grace: Duration) -> io::Result<ExitStatus> {
    if let Some(status) = child.try_wait()? {
        return Ok(status);
    }

    #[cfg(unix)]
    {
        if let Some(pid) = child.id().and_then(|id| i32::try_from(id).ok()) {
            match signal::kill(Pid::from_raw(pid), Signal::SIGTERM) {
                Ok(()) => {
                    if let Ok(result) = timeout(grace, child.wait()).await {
                        return result;
                    }
                    warn!(pid, grace_secs = grace.as_secs_f64(), "backend ignored SIGTERM, killing");
                }
                Err(nix::errno::Errno::ESRCH) => return child.wait().await,
                Err(e) => debug!(pid, error = %e, "SIGTERM failed, killing"),
            }
        }
    }

    #[cfg(not(unix))]
    let _ = grace;

    child.kill().await?;
    child.wait().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::process::Command;

    #[tokio::test]
    #[cfg(unix)]
    async fn sigterm_is_enough_for_sleep() {
        let mut child = Command::new("sleep").arg("30").spawn().unwrap();
        let started = std::time::Instant::now();
        let status = terminate_child(&mut child, Duration::from_secs(5)).await.unwrap();
        assert!(!status.success());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn escalates_when_sigterm_is_ignored() {
        let mut child = Command::new("sh")
            .args(["-c", "trap '' TERM; sleep 30"])
            .spawn()
            .unwrap();
        // let the shell install its trap
        tokio::time::sleep(Duration::from_millis(200)).await;
        let started = std::time::Instant::now();
        terminate_child(&mut child, Duration::from_millis(300)).await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn already_exited_child_is_reaped() {
        let mut child = Command::new("true").spawn().unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        let status = terminate_child(&mut child, Duration::from_secs(1)).await.unwrap();
        assert!(status.success());
    }
}
