//! Updater collaborator.
//!
//! Downloading, verifying and installing releases is handled by an external
//! update mechanism; the dispatcher drives it through [`Updater`].

use crate::components::BoxFuture;
use crate::{AppError, Result};

/// Release server used when the configuration names none.
pub const DEFAULT_UPDATE_URL: &str = "https://pkg.node-session.dev/";

/// Applies package and agent updates.
pub trait Updater: Send + Sync {
    /// Install `version` of `package`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Update`] on download or install failure.
    fn package_update<'a>(
        &'a self,
        package: &'a str,
        version: &'a str,
        url: &'a str,
    ) -> BoxFuture<'a, Result<()>>;

    /// Replace the agent with `version` and restart it through systemd.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Update`] on download, install or restart failure.
    fn update<'a>(&'a self, version: &'a str, url: &'a str) -> BoxFuture<'a, Result<()>>;

    /// Replace only the agent binary with `version`; the caller restarts.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Update`] on download or install failure.
    fn update_only_binary<'a>(&'a self, version: &'a str, url: &'a str)
        -> BoxFuture<'a, Result<()>>;
}

/// Updater for nodes without an update mechanism; every call fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableUpdater;

impl Updater for UnavailableUpdater {
    fn package_update<'a>(
        &'a self,
        package: &'a str,
        version: &'a str,
        _url: &'a str,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            Err(AppError::Update(format!(
                "no updater configured for package {package}:{version}"
            )))
        })
    }

    fn update<'a>(&'a self, version: &'a str, _url: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            Err(AppError::Update(format!(
                "no updater configured for version {version}"
            )))
        })
    }

    fn update_only_binary<'a>(
        &'a self,
        version: &'a str,
        _url: &'a str,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            Err(AppError::Update(format!(
                "no updater configured for version {version}"
            )))
        })
    }
}
