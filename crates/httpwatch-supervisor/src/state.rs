//! Supervision state tracking per application.

use chrono::{DateTime, Utc};
use httpwatch_common::{ProcessError, ProcessResult};
use std::fmt;

/// Supervision state of one managed application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplicationState {
    /// Not supervised yet, or shut down in an orderly fashion
    Stopped,
    /// A start was issued; waiting for the next successful probe
    Starting,
    /// The last probe succeeded
    Running,
    /// The last probe failed
    Unreachable,
}

impl fmt::Display for ApplicationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplicationState::Stopped => write!(f, "stopped"),
            ApplicationState::Starting => write!(f, "starting"),
            ApplicationState::Running => write!(f, "running"),
            ApplicationState::Unreachable => write!(f, "unreachable"),
        }
    }
}

/// State machine guarding the supervision transitions for one application.
///
/// Transitions are driven only by the supervision loop (probe results,
/// starts, orderly shutdown); probes themselves never mutate state.
#[derive(Debug, Clone)]
pub struct SupervisionStateMachine {
    name: String,
    current: ApplicationState,
    previous: Option<ApplicationState>,
    last_transition_time: DateTime<Utc>,
}

impl SupervisionStateMachine {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            current: ApplicationState::Stopped,
            previous: None,
            last_transition_time: Utc::now(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn current_state(&self) -> ApplicationState {
        self.current
    }

    pub fn previous_state(&self) -> Option<ApplicationState> {
        self.previous
    }

    pub fn last_transition_time(&self) -> DateTime<Utc> {
        self.last_transition_time
    }

    pub fn time_in_current_state(&self) -> chrono::Duration {
        Utc::now() - self.last_transition_time
    }

    /// Check if a transition from the current state to `target` is valid.
    ///
    /// A successful probe may promote any state to Running, a failed probe
    /// may demote any state to Unreachable, and shutdown may happen at any
    /// time. Starting is only reachable from Unreachable: a start is always
    /// the direct consequence of a failed probe.
    pub fn is_valid_transition(&self, target: ApplicationState) -> bool {
        match (self.current, target) {
            (current, target) if current == target => true,
            (ApplicationState::Unreachable, ApplicationState::Starting) => true,
            (_, ApplicationState::Starting) => false,
            (_, ApplicationState::Running) => true,
            (_, ApplicationState::Unreachable) => true,
            (_, ApplicationState::Stopped) => true,
        }
    }

    /// Transition to `target`, or fail with `InvalidState`.
    pub fn transition_to(&mut self, target: ApplicationState) -> ProcessResult<()> {
        if !self.is_valid_transition(target) {
            return Err(ProcessError::invalid_state(
                &self.name,
                self.current.to_string(),
                target.to_string(),
            ));
        }

        if self.current != target {
            tracing::debug!("{} transitioned from {} to {}", self.name, self.current, target);
        }

        self.previous = Some(self.current);
        self.current = target;
        self.last_transition_time = Utc::now();

        Ok(())
    }
}
