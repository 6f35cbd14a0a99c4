//! The polling loop tying all managed applications together.
//!
//! One fixed-interval ticker drives a polling pass over every registered
//! application: probe, and on failure (re)start. Every tick is an
//! independent retry - there is no backoff and no failure cap, so a target
//! that stays down is retried on every pass until it recovers.

use crate::application::Application;
use crate::state::{ApplicationState, SupervisionStateMachine};
use futures::future::join_all;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Shared, read-only view of the supervision state of every application.
pub type StateSnapshot = Arc<RwLock<HashMap<String, ApplicationState>>>;

struct SupervisedApplication {
    app: Arc<dyn Application>,
    machine: SupervisionStateMachine,
}

/// Drives periodic supervision of all registered applications.
pub struct Supervisor {
    applications: Vec<SupervisedApplication>,
    poll_interval: Duration,
    states: StateSnapshot,
}

impl Supervisor {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            applications: Vec::new(),
            poll_interval,
            states: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register an application for supervision. Registration happens once,
    /// at startup, before `run`.
    pub fn register(&mut self, app: Arc<dyn Application>) {
        let name = app.name().to_string();
        info!("Registered application {}", name);
        self.states
            .write()
            .insert(name.clone(), ApplicationState::Stopped);
        self.applications.push(SupervisedApplication {
            machine: SupervisionStateMachine::new(&name),
            app,
        });
    }

    pub fn application_count(&self) -> usize {
        self.applications.len()
    }

    /// Handle for observing application states without touching the loop.
    pub fn states(&self) -> StateSnapshot {
        Arc::clone(&self.states)
    }

    /// Run the supervision loop until `cancel` fires, then stop every
    /// application with its bounded wait and return.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!(
            "Supervision loop started ({} applications, poll interval {:?})",
            self.applications.len(),
            self.poll_interval
        );

        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Shutdown requested, leaving the polling loop");
                    break;
                }
                _ = ticker.tick() => {
                    self.poll_all().await;
                }
            }
        }

        self.shutdown_all().await;
    }

    /// One polling pass over all applications.
    async fn poll_all(&mut self) {
        // Probe everything concurrently; each probe is bounded by its own
        // timeout, so one hung target cannot delay the others.
        let results = join_all(
            self.applications
                .iter()
                .map(|entry| entry.app.probe()),
        )
        .await;

        for (entry, healthy) in self.applications.iter_mut().zip(results) {
            if healthy {
                if entry.machine.current_state() != ApplicationState::Running {
                    info!("{} is healthy", entry.app.name());
                    Self::transition(&self.states, &mut entry.machine, ApplicationState::Running);
                }
                continue;
            }

            Self::transition(&self.states, &mut entry.machine, ApplicationState::Unreachable);

            match entry.app.start().await {
                Ok(()) => {
                    Self::transition(&self.states, &mut entry.machine, ApplicationState::Starting);
                }
                Err(e) => {
                    // The loop must keep ticking; the start is retried on
                    // the next pass.
                    error!("Failed to start {}: {}", entry.app.name(), e);
                }
            }
        }
    }

    fn transition(
        states: &StateSnapshot,
        machine: &mut SupervisionStateMachine,
        target: ApplicationState,
    ) {
        match machine.transition_to(target) {
            Ok(()) => {
                states.write().insert(machine.name().to_string(), target);
            }
            Err(e) => error!("{}", e),
        }
    }

    /// Orderly shutdown: stop everything (each stop has its own bounded
    /// wait), then mark all applications Stopped.
    async fn shutdown_all(&mut self) {
        info!("Stopping all applications");

        join_all(self.applications.iter().map(|entry| entry.app.stop())).await;

        for entry in self.applications.iter_mut() {
            Self::transition(&self.states, &mut entry.machine, ApplicationState::Stopped);
        }

        info!("All applications stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use httpwatch_common::{ProcessError, ProcessResult};
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Test double with a scripted probe sequence and call counters.
    struct ScriptedApplication {
        name: String,
        probes: Mutex<VecDeque<bool>>,
        idle_probe: bool,
        fail_start: bool,
        start_calls: AtomicUsize,
        stop_calls: AtomicUsize,
    }

    impl ScriptedApplication {
        fn new(name: &str, script: Vec<bool>, idle_probe: bool) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                probes: Mutex::new(script.into()),
                idle_probe,
                fail_start: false,
                start_calls: AtomicUsize::new(0),
                stop_calls: AtomicUsize::new(0),
            })
        }

        fn failing_start(name: &str) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                probes: Mutex::new(VecDeque::new()),
                idle_probe: false,
                fail_start: true,
                start_calls: AtomicUsize::new(0),
                stop_calls: AtomicUsize::new(0),
            })
        }

        fn starts(&self) -> usize {
            self.start_calls.load(Ordering::SeqCst)
        }

        fn stops(&self) -> usize {
            self.stop_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Application for ScriptedApplication {
        fn name(&self) -> &str {
            &self.name
        }

        async fn probe(&self) -> bool {
            self.probes.lock().pop_front().unwrap_or(self.idle_probe)
        }

        async fn start(&self) -> ProcessResult<()> {
            self.start_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_start {
                Err(ProcessError::spawn_failed(&self.name, "executable not found"))
            } else {
                Ok(())
            }
        }

        async fn stop(&self) {
            self.stop_calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn state_of(states: &StateSnapshot, name: &str) -> ApplicationState {
        *states.read().get(name).unwrap()
    }

    const TICK: Duration = Duration::from_millis(200);

    #[tokio::test]
    async fn test_failed_probe_triggers_exactly_one_start() {
        // Nothing listening on the first pass, healthy afterwards
        let app = ScriptedApplication::new("python-http-server", vec![false], true);

        let mut supervisor = Supervisor::new(TICK);
        supervisor.register(app.clone());
        let states = supervisor.states();

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(supervisor.run(cancel.clone()));

        // After the first pass: one start, Stopped -> Unreachable -> Starting
        tokio::time::sleep(TICK / 2).await;
        assert_eq!(app.starts(), 1);
        assert_eq!(
            state_of(&states, "python-http-server"),
            ApplicationState::Starting
        );

        // Second pass probes healthy: promoted to Running, no further start
        tokio::time::sleep(TICK).await;
        assert_eq!(app.starts(), 1);
        assert_eq!(
            state_of(&states, "python-http-server"),
            ApplicationState::Running
        );

        cancel.cancel();
        handle.await.unwrap();

        assert_eq!(app.stops(), 1);
        assert_eq!(
            state_of(&states, "python-http-server"),
            ApplicationState::Stopped
        );
    }

    #[tokio::test]
    async fn test_crash_between_ticks_triggers_single_restart() {
        // Healthy, then crashed, then healthy again after the restart
        let app = ScriptedApplication::new("node-dev-server", vec![true, false], true);

        let mut supervisor = Supervisor::new(TICK);
        supervisor.register(app.clone());
        let states = supervisor.states();

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(supervisor.run(cancel.clone()));

        tokio::time::sleep(TICK / 2).await;
        assert_eq!(app.starts(), 0);
        assert_eq!(
            state_of(&states, "node-dev-server"),
            ApplicationState::Running
        );

        tokio::time::sleep(TICK).await;
        assert_eq!(app.starts(), 1);

        tokio::time::sleep(TICK).await;
        assert_eq!(app.starts(), 1);
        assert_eq!(
            state_of(&states, "node-dev-server"),
            ApplicationState::Running
        );

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_start_failure_keeps_loop_ticking() {
        let broken = ScriptedApplication::failing_start("broken-app");
        let healthy = ScriptedApplication::new("healthy-app", vec![], true);

        let mut supervisor = Supervisor::new(TICK);
        supervisor.register(broken.clone());
        supervisor.register(healthy.clone());
        let states = supervisor.states();

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(supervisor.run(cancel.clone()));

        // Two passes: the broken app is retried on each one, and its start
        // failure never takes the loop down
        tokio::time::sleep(TICK / 2 + TICK).await;
        assert!(broken.starts() >= 2);
        assert_eq!(
            state_of(&states, "broken-app"),
            ApplicationState::Unreachable
        );
        assert_eq!(
            state_of(&states, "healthy-app"),
            ApplicationState::Running
        );

        cancel.cancel();
        handle.await.unwrap();
        assert_eq!(broken.stops(), 1);
        assert_eq!(healthy.stops(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_stops_every_application() {
        // Both applications stay unreachable, so shutdown arrives while
        // they are Starting
        let first = ScriptedApplication::new("first", vec![], false);
        let second = ScriptedApplication::new("second", vec![], false);

        let mut supervisor = Supervisor::new(TICK);
        supervisor.register(first.clone());
        supervisor.register(second.clone());
        assert_eq!(supervisor.application_count(), 2);
        let states = supervisor.states();

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(supervisor.run(cancel.clone()));

        tokio::time::sleep(TICK / 2).await;
        assert_eq!(state_of(&states, "first"), ApplicationState::Starting);

        cancel.cancel();
        handle.await.unwrap();

        assert_eq!(first.stops(), 1);
        assert_eq!(second.stops(), 1);
        assert_eq!(state_of(&states, "first"), ApplicationState::Stopped);
        assert_eq!(state_of(&states, "second"), ApplicationState::Stopped);
    }

    #[tokio::test]
    async fn test_states_snapshot_starts_stopped() {
        let mut supervisor = Supervisor::new(TICK);
        supervisor.register(ScriptedApplication::new("app", vec![], true));

        let states = supervisor.states();
        assert_eq!(state_of(&states, "app"), ApplicationState::Stopped);
    }
}
