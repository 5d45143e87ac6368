//! Host-level collaborators: reboot, systemd probing and process exit.
//!
//! The dispatcher only sees the traits; [`systemd::SystemctlProbe`],
//! [`reboot::SystemRebooter`] and [`StdProcessExit`] are the implementations
//! wired in by the binary.

pub mod reboot;
pub mod systemd;

use std::time::Duration;

use crate::components::BoxFuture;
use crate::Result;

/// Reboots the machine.
pub trait Rebooter: Send + Sync {
    /// Trigger a reboot after `delay`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Host`](crate::AppError::Host) when the reboot
    /// could not be scheduled.
    fn reboot(&self, delay: Duration) -> BoxFuture<'_, Result<()>>;
}

/// Answers whether a systemd unit is active.
pub trait SystemdProbe: Send + Sync {
    /// Whether `unit` is currently active.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Host`](crate::AppError::Host) when systemd cannot
    /// be queried.
    fn is_active(&self, unit: &str) -> BoxFuture<'_, Result<bool>>;
}

/// Terminates the current process.
pub trait ProcessExit: Send + Sync {
    /// Exit with `code`. Implementations backed by the real process never
    /// return.
    fn exit(&self, code: i32);
}

/// [`ProcessExit`] backed by [`std::process::exit`].
#[derive(Debug, Default, Clone, Copy)]
pub struct StdProcessExit;

impl ProcessExit for StdProcessExit {
    fn exit(&self, code: i32) {
        std::process::exit(code);
    }
}
