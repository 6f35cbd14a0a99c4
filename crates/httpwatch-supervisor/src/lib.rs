//! # httpwatch-supervisor
//!
//! Supervision core for the httpwatch watchdog.
//!
//! This crate ties together:
//! - the [`Application`] contract (probe / start / stop)
//! - per-application process lifecycle management
//! - the configuration surface (launch recipes, timeouts)
//! - the periodic [`Supervisor`] polling loop
//!
//! **Architecture:**
//! ```text
//! Supervisor (polling loop, state machine per application)
//!       | probes / starts / stops
//! Application trait
//!       | implemented by
//! HttpApplication (HTTP probe + launch recipe)
//!       | owns
//! ProcessLifecycleManager (spawn, supersede, bounded stop)
//! ```

pub mod application;
pub mod config;
pub mod process;
pub mod state;
pub mod supervisor;

// Re-export main types
pub use application::{Application, HttpApplication};
pub use config::{
    ApplicationConfig, LaunchRecipe, ResolvedCommand, WatchdogConfig, WatchdogOptions,
};
pub use process::ProcessLifecycleManager;
pub use state::{ApplicationState, SupervisionStateMachine};
pub use supervisor::{StateSnapshot, Supervisor};
