//! Process lifecycle management for one application.
//!
//! `ProcessLifecycleManager` owns the single OS process of a managed
//! application. It enforces the lifecycle invariants:
//!
//! - at most one live process per application at any instant
//! - `start` supersedes any existing process (stop-then-spawn)
//! - `stop` is idempotent, waits a bounded interval, and always releases
//!   the process slot, even when termination fails
//! - start/stop for one application never overlap (one async mutex per
//!   application); different applications never contend

use crate::config::ResolvedCommand;
use httpwatch_common::{ProcessError, ProcessResult};
use httpwatch_process::{force_kill, terminate_gracefully};
use std::fmt;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

const FORCE_KILL_TIMEOUT: Duration = Duration::from_secs(3);

/// Owns and sequences the OS process of one managed application.
pub struct ProcessLifecycleManager {
    name: String,
    command: ResolvedCommand,
    stop_timeout: Duration,
    slot: Mutex<ProcessSlot>,
}

/// The exclusively-owned process handle of one application.
///
/// The `Child` itself lives inside the exit-monitor task (which `wait()`s
/// it and so reaps the process); the slot keeps the PID, the stop-request
/// flag shared with the monitor, and the monitor's join handle. A finished
/// monitor is the confirmation that the process has exited.
#[derive(Default)]
struct ProcessSlot {
    pid: Option<u32>,
    stop_requested: Option<Arc<AtomicBool>>,
    exit_monitor: Option<JoinHandle<()>>,
}

impl ProcessSlot {
    fn is_live(&self) -> bool {
        self.pid.is_some()
            && self
                .exit_monitor
                .as_ref()
                .map(|monitor| !monitor.is_finished())
                .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy)]
enum OutputStream {
    Stdout,
    Stderr,
}

impl fmt::Display for OutputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputStream::Stdout => write!(f, "stdout"),
            OutputStream::Stderr => write!(f, "stderr"),
        }
    }
}

impl ProcessLifecycleManager {
    pub fn new(name: String, command: ResolvedCommand, stop_timeout: Duration) -> Self {
        Self {
            name,
            command,
            stop_timeout,
            slot: Mutex::new(ProcessSlot::default()),
        }
    }

    /// Current PID, if a process was started and not yet released.
    pub async fn pid(&self) -> Option<u32> {
        self.slot.lock().await.pid
    }

    /// Whether a spawned process is still alive.
    pub async fn is_running(&self) -> bool {
        self.slot.lock().await.is_live()
    }

    /// Spawn the application's process.
    ///
    /// Blocks until the child has been spawned, not until it is healthy. If
    /// a previous process is still tracked it is stopped first, so `start`
    /// is safe to call whenever a probe fails, without knowing whether a
    /// stale process exists. Only spawn failure itself is propagated.
    pub async fn start(&self) -> ProcessResult<()> {
        let mut slot = self.slot.lock().await;

        if slot.pid.is_some() {
            if slot.is_live() {
                info!(
                    "Stopping existing process for {} before starting a new one",
                    self.name
                );
            }
            self.stop_locked(&mut slot).await;
        }

        info!(
            "Starting process for {} in {}",
            self.name,
            self.command.working_directory.display()
        );

        let mut cmd = Command::new(&self.command.program);
        cmd.args(&self.command.args)
            .current_dir(&self.command.working_directory)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        // The child leads its own process group so that stop() can take
        // down the whole tree it spawns.
        #[cfg(unix)]
        cmd.process_group(0);

        #[cfg(windows)]
        {
            const CREATE_NEW_PROCESS_GROUP: u32 = 0x00000200;
            cmd.creation_flags(CREATE_NEW_PROCESS_GROUP);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| ProcessError::spawn_failed(&self.name, e.to_string()))?;

        let pid = child.id().unwrap_or(0);

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_output(
                self.name.clone(),
                OutputStream::Stdout,
                stdout,
            ));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_output(
                self.name.clone(),
                OutputStream::Stderr,
                stderr,
            ));
        }

        let stop_requested = Arc::new(AtomicBool::new(false));
        let monitor = tokio::spawn(monitor_exit(
            self.name.clone(),
            child,
            Arc::clone(&stop_requested),
        ));

        slot.pid = Some(pid);
        slot.stop_requested = Some(stop_requested);
        slot.exit_monitor = Some(monitor);

        info!("Process started for {} (PID: {})", self.name, pid);
        Ok(())
    }

    /// Stop the application's process.
    ///
    /// A no-op when no process is tracked. Otherwise terminates the process
    /// group, waits up to the stop timeout for exit, force kills on timeout,
    /// and releases the slot unconditionally. Termination errors are logged,
    /// never raised.
    pub async fn stop(&self) {
        let mut slot = self.slot.lock().await;

        if slot.pid.is_none() {
            debug!("No process to stop for {}", self.name);
            return;
        }

        self.stop_locked(&mut slot).await;
    }

    async fn stop_locked(&self, slot: &mut ProcessSlot) {
        let Some(pid) = slot.pid.take() else {
            return;
        };
        if let Some(flag) = slot.stop_requested.take() {
            flag.store(true, Ordering::SeqCst);
        }
        let monitor = slot.exit_monitor.take();

        let already_exited = monitor
            .as_ref()
            .map(|task| task.is_finished())
            .unwrap_or(true);
        if already_exited {
            debug!("Process for {} has already exited (PID: {})", self.name, pid);
            if let Some(task) = monitor {
                let _ = task.await;
            }
            return;
        }

        info!("Stopping process for {} (PID: {})", self.name, pid);
        if let Err(e) = terminate_gracefully(pid) {
            warn!("Failed to signal process group for {}: {}", self.name, e);
        }

        let Some(mut task) = monitor else {
            return;
        };

        if timeout(self.stop_timeout, &mut task).await.is_ok() {
            info!("Process for {} stopped", self.name);
            return;
        }

        warn!(
            "{}",
            ProcessError::timeout(
                &self.name,
                format!("stop (no exit within {:?})", self.stop_timeout),
            )
        );

        if let Err(e) = force_kill(pid) {
            error!("Force kill failed for {} (PID: {}): {}", self.name, pid, e);
        }

        if timeout(FORCE_KILL_TIMEOUT, &mut task).await.is_ok() {
            info!("Process for {} stopped after force kill", self.name);
            return;
        }

        // The slot is already cleared above: a wedged process must not be
        // able to block future restarts.
        task.abort();
        warn!(
            "Abandoning wedged process for {} (PID: {})",
            self.name, pid
        );
    }
}

/// Wait for the child to exit and classify the exit.
///
/// The monitor owns the `Child`, so its completion both reaps the process
/// and serves as the exit confirmation awaited by `stop`.
async fn monitor_exit(name: String, mut child: Child, stop_requested: Arc<AtomicBool>) {
    match child.wait().await {
        Ok(status) => {
            if stop_requested.load(Ordering::SeqCst) {
                debug!("Process for {} exited after stop request ({})", name, status);
            } else {
                // No immediate action: the next polling pass observes the
                // failed probe and restarts.
                warn!("Process for {} exited unexpectedly ({})", name, status);
            }
        }
        Err(e) => warn!("Failed to observe exit of process for {}: {}", name, e),
    }
}

/// Forward captured child output to the log stream, one record per line,
/// tagged with the application name and stream.
async fn forward_output<R>(name: String, stream: OutputStream, reader: R)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match stream {
                OutputStream::Stdout => info!("[{} stdout] {}", name, line),
                OutputStream::Stderr => error!("[{} stderr] {}", name, line),
            },
            Ok(None) => break,
            Err(e) => {
                warn!("Output capture ended for {} {}: {}", name, stream, e);
                break;
            }
        }
    }
}
