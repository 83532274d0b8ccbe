//! Backend process lifecycle: spawning, output streaming, readiness,
//! restarts and termination.

mod readiness;
mod shutdown;
mod stream;
mod supervisor;

pub use readiness::{ExitProbe, Readiness, wait_for_ready};
pub use shutdown::terminate_child;
pub use stream::{LogLine, StreamingLogReader};
pub use supervisor::{
    ProcessSupervisor, STATUS_EXITED_EARLY, STATUS_LAUNCHING, STATUS_NOT_STARTED, STATUS_STOPPED,
    STATUS_STOPPING, STATUS_TIMED_OUT, STATUS_WAITING, StatusUpdate, SupervisorConfig,
};
