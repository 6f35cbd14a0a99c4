//! Process existence checking.
//!
//! Provides a cross-platform, non-destructive way to determine whether a
//! process is still alive.

use httpwatch_common::ProcessResult;

/// Check if a process with the given PID exists and is running.
///
/// On Unix this uses `kill(pid, 0)`, which delivers no signal but reports
/// whether the process exists. On Windows it uses `OpenProcess`.
///
/// # Returns
///
/// * `Ok(true)` - Process exists and is running
/// * `Ok(false)` - Process does not exist
/// * `Err(_)` - Existence could not be determined
pub fn process_exists(pid: u32) -> ProcessResult<bool> {
    #[cfg(unix)]
    {
        process_exists_unix(pid)
    }

    #[cfg(windows)]
    {
        process_exists_windows(pid)
    }
}

#[cfg(unix)]
fn process_exists_unix(pid: u32) -> ProcessResult<bool> {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    match kill(Pid::from_raw(pid as i32), None) {
        Ok(_) => Ok(true),
        Err(nix::errno::Errno::ESRCH) => Ok(false),
        // Process exists but belongs to another user
        Err(nix::errno::Errno::EPERM) => Ok(true),
        Err(e) => Err(httpwatch_common::ProcessError::check_failed(
            pid.to_string(),
            format!("Failed to check process: {}", e),
        )),
    }
}

#[cfg(windows)]
fn process_exists_windows(pid: u32) -> ProcessResult<bool> {
    use windows::Win32::Foundation::{CloseHandle, HANDLE};
    use windows::Win32::System::Threading::{OpenProcess, PROCESS_QUERY_LIMITED_INFORMATION};

    unsafe {
        let handle: HANDLE = match OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, pid) {
            Ok(h) => h,
            Err(e) => {
                let error_code = e.code().0 as u32;
                const ERROR_INVALID_PARAMETER: u32 = 0x80070057;
                const ERROR_ACCESS_DENIED: u32 = 0x80070005;

                if error_code == ERROR_INVALID_PARAMETER || error_code == ERROR_ACCESS_DENIED {
                    return Ok(false);
                }
                return Err(httpwatch_common::ProcessError::check_failed(
                    pid.to_string(),
                    format!("Failed to check process: {}", e),
                ));
            }
        };

        let _ = CloseHandle(handle);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_process_exists() {
        let current_pid = std::process::id();
        assert!(process_exists(current_pid).unwrap());
    }

    #[test]
    fn test_nonexistent_process() {
        // High PIDs are extremely unlikely to be in use
        let unlikely_pid = if cfg!(windows) { 99999999 } else { 9999999 };
        let _ = process_exists(unlikely_pid).unwrap();
    }

    #[test]
    #[cfg(unix)]
    fn test_system_process() {
        // PID 1 (init/systemd) always exists on Unix
        assert!(process_exists(1).unwrap());
    }
}
