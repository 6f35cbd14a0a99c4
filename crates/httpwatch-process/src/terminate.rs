//! Process-tree termination.
//!
//! The watchdog spawns every child as the leader of its own process group,
//! so both functions here signal the whole group: a dev server that forks
//! worker processes is torn down together with them.

use httpwatch_common::ProcessResult;

/// Ask a process group to terminate (SIGTERM on Unix, Ctrl+Break on Windows).
pub fn terminate_gracefully(pid: u32) -> ProcessResult<()> {
    #[cfg(unix)]
    {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        killpg(Pid::from_raw(pid as i32), Signal::SIGTERM).map_err(|e| {
            httpwatch_common::ProcessError::stop_failed(pid.to_string(), e.to_string())
        })
    }

    #[cfg(windows)]
    {
        // The child was created with CREATE_NEW_PROCESS_GROUP, so Ctrl+Break
        // reaches the whole console group.
        crate::terminate_windows::send_ctrl_break(pid)
            .map_err(|e| httpwatch_common::ProcessError::stop_failed(pid.to_string(), e))
    }
}

/// Force kill a process group (SIGKILL on Unix, TerminateProcess on Windows).
pub fn force_kill(pid: u32) -> ProcessResult<()> {
    #[cfg(unix)]
    {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        killpg(Pid::from_raw(pid as i32), Signal::SIGKILL).map_err(|e| {
            httpwatch_common::ProcessError::stop_failed(pid.to_string(), e.to_string())
        })
    }

    #[cfg(windows)]
    {
        crate::terminate_windows::terminate_process(pid)
            .map_err(|e| httpwatch_common::ProcessError::stop_failed(pid.to_string(), e))
    }
}
