//! `update` handler.
//!
//! `update_version` of the form `"package:version"` pins a package; anything
//! else is a self-update of the agent. A self-update runs one of two paths:
//!
//! - systemd-managed agent: [`Updater::update`] installs and restarts through
//!   systemd;
//! - otherwise, with an exit code configured: [`Updater::update_only_binary`]
//!   replaces the binary, the response is queued and then the process exits
//!   with that code so the supervisor restarts it.
//!
//! [`Updater::update`]: crate::update::Updater::update
//! [`Updater::update_only_binary`]: crate::update::Updater::update_only_binary

use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::query::with_deadline;
use super::{Dispatcher, Outcome};
use crate::models::request::{Request, UpdateTarget};
use crate::models::response::Response;

const NOT_MANAGED: &str = "agent is not managed with systemd and no auto update exit code is set";

/// How a self-update restarts the agent.
#[derive(Debug, Clone, Copy)]
enum Restart {
    Systemd,
    Exit(i32),
}

impl Dispatcher {
    pub(super) async fn update(&self, request: &Request, deadline: Instant) -> Outcome {
        match request.update_target() {
            UpdateTarget::Package { package, version } => {
                let result = with_deadline(
                    deadline,
                    self.deps
                        .updater
                        .package_update(package, version, &self.options.update_url),
                )
                .await;
                match result {
                    Ok(()) => info!(package, version, "received package update request"),
                    Err(err) => warn!(package, version, %err, "package update failed"),
                }
                Outcome::Reply(Response::ack())
            }
            UpdateTarget::SelfUpdate { version } => self.self_update(version, deadline).await,
        }
    }

    async fn self_update(&self, version: &str, deadline: Instant) -> Outcome {
        if !self.options.enable_auto_update {
            warn!("auto update is disabled -- skipping update");
            return Outcome::Reply(Response::failed("auto update is disabled"));
        }

        let unit = self.options.systemd_unit.as_str();
        let systemd_managed = match with_deadline(deadline, self.deps.systemd.is_active(unit)).await
        {
            Ok(active) => active,
            Err(err) => {
                debug!(unit, %err, "failed to query systemd, assuming unmanaged");
                false
            }
        };

        let restart = match (systemd_managed, self.options.exit_code()) {
            (true, _) => Restart::Systemd,
            (false, Some(code)) => Restart::Exit(code),
            (false, None) => {
                warn!(unit, "{NOT_MANAGED}");
                return Outcome::Reply(Response::failed(NOT_MANAGED));
            }
        };

        if version.is_empty() {
            warn!("update_version is empty");
            return Outcome::Reply(Response::failed("update_version is empty"));
        }

        let url = self.options.update_url.as_str();
        match restart {
            Restart::Systemd => {
                match with_deadline(deadline, self.deps.updater.update(version, url)).await {
                    Ok(()) => {
                        info!(version, "agent updated, systemd restarts it");
                        Outcome::Reply(Response::ack())
                    }
                    Err(err) => {
                        error!(version, %err, "failed to update agent");
                        Outcome::Reply(Response::failed(err.to_string()))
                    }
                }
            }
            Restart::Exit(code) => {
                match with_deadline(deadline, self.deps.updater.update_only_binary(version, url))
                    .await
                {
                    Ok(()) => {
                        info!(version, exit_code = code, "binary updated, exiting for restart");
                        Outcome::ReplyThenExit(Response::ack(), code)
                    }
                    Err(err) => {
                        error!(version, %err, "failed to update agent binary");
                        Outcome::Reply(Response::failed(err.to_string()))
                    }
                }
            }
        }
    }
}
