//! `systemctl`-backed unit probe.

use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use super::SystemdProbe;
use crate::components::BoxFuture;
use crate::{AppError, Result};

/// Queries unit state with `systemctl is-active`.
#[derive(Debug, Clone)]
pub struct SystemctlProbe {
    systemctl: String,
}

impl SystemctlProbe {
    /// Probe using the `systemctl` binary found on `PATH`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_binary("systemctl")
    }

    /// Probe using an explicit `systemctl` binary path.
    #[must_use]
    pub fn with_binary(systemctl: impl Into<String>) -> Self {
        Self {
            systemctl: systemctl.into(),
        }
    }
}

impl Default for SystemctlProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemdProbe for SystemctlProbe {
    fn is_active(&self, unit: &str) -> BoxFuture<'_, Result<bool>> {
        let unit = unit.to_owned();
        Box::pin(async move {
            let output = Command::new(&self.systemctl)
                .arg("is-active")
                .arg(&unit)
                .stdin(Stdio::null())
                .output()
                .await
                .map_err(|err| AppError::Host(format!("failed to run systemctl: {err}")))?;

            // `is-active` exits non-zero for inactive units; stdout carries the state.
            let state = String::from_utf8_lossy(&output.stdout).trim().to_owned();
            debug!(unit, state, "systemd unit state");
            Ok(state == "active")
        })
    }
}
