//! Windows-specific process termination.
//!
//! Graceful shutdown uses `GenerateConsoleCtrlEvent` with `CTRL_BREAK_EVENT`,
//! which is delivered to the child's console process group (the child is
//! created with `CREATE_NEW_PROCESS_GROUP`). Forced shutdown falls back to
//! `TerminateProcess`.

use std::sync::Mutex;
use windows::Win32::Foundation::CloseHandle;
use windows::Win32::System::Console::{GenerateConsoleCtrlEvent, CTRL_BREAK_EVENT};
use windows::Win32::System::Threading::{OpenProcess, TerminateProcess, PROCESS_TERMINATE};

// Console control events are process-wide; serialize them.
static CONSOLE_OPERATION_LOCK: Mutex<()> = Mutex::new(());

/// Send Ctrl+Break to the console process group led by `pid`.
pub fn send_ctrl_break(pid: u32) -> Result<(), String> {
    if pid == 0 {
        return Err(format!("Invalid PID: {}", pid));
    }

    let _lock = CONSOLE_OPERATION_LOCK
        .lock()
        .map_err(|e| format!("Failed to acquire console lock: {}", e))?;

    unsafe {
        GenerateConsoleCtrlEvent(CTRL_BREAK_EVENT, pid)
            .map_err(|e| format!("GenerateConsoleCtrlEvent failed: {}", e))
    }
}

/// Terminate the process with `pid` outright.
pub fn terminate_process(pid: u32) -> Result<(), String> {
    if pid == 0 {
        return Err(format!("Invalid PID: {}", pid));
    }

    unsafe {
        let handle = OpenProcess(PROCESS_TERMINATE, false, pid)
            .map_err(|e| format!("OpenProcess failed: {}", e))?;

        let result = TerminateProcess(handle, 1);
        let _ = CloseHandle(handle);

        result.map_err(|e| format!("TerminateProcess failed: {}", e))
    }
}
