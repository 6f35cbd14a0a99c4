//! Error types for watchdog process management.

use thiserror::Error;

/// Process-specific error types for lifecycle operations.
///
/// Every variant carries the application name it relates to, so errors stay
/// correlated with their application in the log stream.
#[derive(Error, Debug, Clone)]
pub enum ProcessError {
    #[error("Process spawn failed: {name} - {reason}")]
    SpawnFailed { name: String, reason: String },

    #[error("Process stop failed: {name} - {reason}")]
    StopFailed { name: String, reason: String },

    #[error("Process timeout: {name} - {operation}")]
    Timeout { name: String, operation: String },

    #[error("Invalid state transition for {name}: {current} -> {requested}")]
    InvalidState {
        name: String,
        current: String,
        requested: String,
    },

    #[error("Process check failed: {name} - {reason}")]
    CheckFailed { name: String, reason: String },
}

impl ProcessError {
    pub fn spawn_failed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SpawnFailed {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn stop_failed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::StopFailed {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn timeout(name: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::Timeout {
            name: name.into(),
            operation: operation.into(),
        }
    }

    pub fn invalid_state(
        name: impl Into<String>,
        current: impl Into<String>,
        requested: impl Into<String>,
    ) -> Self {
        Self::InvalidState {
            name: name.into(),
            current: current.into(),
            requested: requested.into(),
        }
    }

    pub fn check_failed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CheckFailed {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for process operations.
pub type ProcessResult<T> = std::result::Result<T, ProcessError>;
