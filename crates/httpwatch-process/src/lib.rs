//! # httpwatch-process
//!
//! Low-level OS process primitives for the httpwatch watchdog.
//!
//! This crate provides cross-platform building blocks for:
//! - Process existence checks
//! - Graceful and forced termination of a process and its descendants
//!
//! Every child the watchdog spawns is placed in its own process group
//! (console group on Windows), so termination here always targets the
//! whole group rather than a single PID.

pub mod check;
pub mod terminate;

#[cfg(windows)]
pub mod terminate_windows;

pub use check::*;
pub use terminate::*;
