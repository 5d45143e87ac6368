//! `systemctl reboot`-backed rebooter.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{error, info, warn};

use super::Rebooter;
use crate::components::BoxFuture;
use crate::{AppError, Result};

/// Reboots through `systemctl reboot`.
#[derive(Debug, Clone)]
pub struct SystemRebooter {
    systemctl: String,
}

impl SystemRebooter {
    /// Rebooter using the `systemctl` binary found on `PATH`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_binary("systemctl")
    }

    /// Rebooter invoking an explicit `systemctl` binary path.
    #[must_use]
    pub fn with_binary(systemctl: impl Into<String>) -> Self {
        Self {
            systemctl: systemctl.into(),
        }
    }
}

impl Default for SystemRebooter {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_reboot(systemctl: &str) -> Result<()> {
    let status = Command::new(systemctl)
        .arg("reboot")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map_err(|err| AppError::Host(format!("failed to run systemctl reboot: {err}")))?;

    if status.success() {
        Ok(())
    } else {
        Err(AppError::Host(format!("systemctl reboot exited with {status}")))
    }
}

impl Rebooter for SystemRebooter {
    fn reboot(&self, delay: Duration) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if delay.is_zero() {
                info!("rebooting host now");
                return run_reboot(&self.systemctl).await;
            }

            warn!(delay_secs = delay.as_secs(), "host reboot scheduled");
            let systemctl = self.systemctl.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                if let Err(err) = run_reboot(&systemctl).await {
                    error!(%err, "delayed reboot failed");
                }
            });
            Ok(())
        })
    }
}
