//! The supervision contract and the generic managed application.

use crate::config::{ApplicationConfig, WatchdogOptions};
use crate::process::ProcessLifecycleManager;
use async_trait::async_trait;
use httpwatch_common::ProcessResult;
use httpwatch_probe::{probe_endpoint, ProbeOutcome};
use std::time::Duration;
use tracing::{debug, error, warn};

/// The capability set every monitored application must implement: it can be
/// health-checked, started, and stopped.
#[async_trait]
pub trait Application: Send + Sync {
    /// Stable identifier, used as log correlation key.
    fn name(&self) -> &str;

    /// One bounded reachability check. Returns `true` only for a 2xx
    /// response; every failure collapses to `false` and is never raised.
    async fn probe(&self) -> bool;

    /// Spawn the underlying process, superseding any existing one.
    /// Only spawn failure itself propagates.
    async fn start(&self) -> ProcessResult<()>;

    /// Terminate the underlying process tree. Idempotent, bounded,
    /// never raises.
    async fn stop(&self);
}

/// A managed application probed over HTTP and launched from a resolved
/// launch recipe. Both recipe kinds share this one type; the recipe only
/// determines the spawned command.
pub struct HttpApplication {
    name: String,
    probe_url: String,
    probe_timeout: Duration,
    lifecycle: ProcessLifecycleManager,
}

impl HttpApplication {
    /// Build an application from its configuration. The launch recipe is
    /// resolved here, once.
    pub fn from_config(config: &ApplicationConfig, options: &WatchdogOptions) -> Self {
        let command = config.recipe.resolve(&config.host, config.port());

        Self {
            name: config.name.clone(),
            probe_url: config.probe_url(),
            probe_timeout: config.probe_timeout.unwrap_or(options.probe_timeout),
            lifecycle: ProcessLifecycleManager::new(
                config.name.clone(),
                command,
                options.stop_timeout,
            ),
        }
    }

    pub fn probe_url(&self) -> &str {
        &self.probe_url
    }
}

#[async_trait]
impl Application for HttpApplication {
    fn name(&self) -> &str {
        &self.name
    }

    async fn probe(&self) -> bool {
        let outcome = probe_endpoint(&self.probe_url, self.probe_timeout).await;

        // Exactly one log record per probe, severity by failure class
        match &outcome {
            ProbeOutcome::Healthy(_) => debug!("{} is reachable", self.name),
            ProbeOutcome::Unhealthy(status) => {
                warn!("{} responded with status {}", self.name, status)
            }
            ProbeOutcome::Unreachable(reason) => {
                warn!("{} is not reachable: {}", self.name, reason)
            }
            ProbeOutcome::TimedOut => warn!(
                "Probe of {} timed out after {:?}",
                self.name, self.probe_timeout
            ),
            ProbeOutcome::Failed(reason) => error!("Error probing {}: {}", self.name, reason),
        }

        outcome.is_healthy()
    }

    async fn start(&self) -> ProcessResult<()> {
        self.lifecycle.start().await
    }

    async fn stop(&self) {
        self.lifecycle.stop().await
    }
}
