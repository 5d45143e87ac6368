//! Agent configuration parsing, validation, and session options.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::update::DEFAULT_UPDATE_URL;
use crate::{AppError, Result};

/// Sentinel meaning "no auto-update exit code configured".
pub const EXIT_CODE_UNSET: i32 = -1;

/// Environment variable consulted when the config file carries no token.
pub const TOKEN_ENV_VAR: &str = "NODE_SESSION_TOKEN";

fn default_reconnect_interval_seconds() -> u64 {
    1
}

fn default_read_idle_timeout_seconds() -> u64 {
    120
}

fn default_request_timeout_seconds() -> u64 {
    60
}

fn default_exit_code() -> i32 {
    EXIT_CODE_UNSET
}

fn default_package_root() -> PathBuf {
    PathBuf::from("/var/lib/node-session/packages")
}

fn default_update_url() -> String {
    DEFAULT_UPDATE_URL.into()
}

fn default_systemd_unit() -> String {
    "node-session.service".into()
}

/// Options controlling one [`Session`](crate::session::Session).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// Identifier sent on both legs as the `machine_id` header.
    pub machine_id: String,
    /// Control-plane token sent as the `token` header when present.
    pub token: Option<String>,
    /// Spacing between reconnection attempts.
    pub reconnect_interval: Duration,
    /// Reader leg is torn down after this long without an inbound message.
    pub read_idle_timeout: Duration,
    /// Per-request deadline applied by the dispatcher.
    pub request_timeout: Duration,
    /// Whether self-update requests are honoured.
    pub enable_auto_update: bool,
    /// Exit code used to request a restart after a binary-only update;
    /// [`EXIT_CODE_UNSET`] when not configured.
    pub auto_update_exit_code: i32,
    /// Directory whose package subdirectories `delete` marks for removal.
    pub package_root: PathBuf,
    /// Release server handed to the updater.
    pub update_url: String,
    /// Unit name used to detect a systemd-managed agent.
    pub systemd_unit: String,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            machine_id: String::new(),
            token: None,
            reconnect_interval: Duration::from_secs(default_reconnect_interval_seconds()),
            read_idle_timeout: Duration::from_secs(default_read_idle_timeout_seconds()),
            request_timeout: Duration::from_secs(default_request_timeout_seconds()),
            enable_auto_update: false,
            auto_update_exit_code: EXIT_CODE_UNSET,
            package_root: default_package_root(),
            update_url: default_update_url(),
            systemd_unit: default_systemd_unit(),
        }
    }
}

impl SessionOptions {
    /// Options for `machine_id` with every other value defaulted.
    #[must_use]
    pub fn new(machine_id: impl Into<String>) -> Self {
        Self {
            machine_id: machine_id.into(),
            ..Self::default()
        }
    }

    /// Configured auto-update exit code, if any.
    #[must_use]
    pub fn exit_code(&self) -> Option<i32> {
        (self.auto_update_exit_code != EXIT_CODE_UNSET).then_some(self.auto_update_exit_code)
    }

    /// Check option combinations.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if an exit code is set while auto-update is
    /// disabled, or if a timing value is zero.
    pub fn validate(&self) -> Result<()> {
        if !self.enable_auto_update && self.exit_code().is_some() {
            return Err(AppError::Config(
                "auto update is disabled but auto update by exit code is set".into(),
            ));
        }

        if self.reconnect_interval.is_zero() {
            return Err(AppError::Config(
                "reconnect_interval must be greater than zero".into(),
            ));
        }

        if self.read_idle_timeout.is_zero() {
            return Err(AppError::Config(
                "read_idle_timeout must be greater than zero".into(),
            ));
        }

        if self.request_timeout.is_zero() {
            return Err(AppError::Config(
                "request_timeout must be greater than zero".into(),
            ));
        }

        Ok(())
    }
}

/// `[session]` table of the configuration file.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SessionSection {
    /// Seconds between reconnection attempts.
    #[serde(default = "default_reconnect_interval_seconds")]
    pub reconnect_interval_seconds: u64,
    /// Seconds without inbound traffic before the reader leg is recycled.
    #[serde(default = "default_read_idle_timeout_seconds")]
    pub read_idle_timeout_seconds: u64,
    /// Per-request dispatcher deadline in seconds.
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
    /// Whether self-update requests are honoured.
    #[serde(default)]
    pub enable_auto_update: bool,
    /// Exit code requesting a restart after a binary-only update.
    #[serde(default = "default_exit_code")]
    pub auto_update_exit_code: i32,
    /// Root directory of installed packages.
    #[serde(default = "default_package_root")]
    pub package_root: PathBuf,
    /// Release server for updates.
    #[serde(default = "default_update_url")]
    pub update_url: String,
    /// Systemd unit of the agent.
    #[serde(default = "default_systemd_unit")]
    pub systemd_unit: String,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            reconnect_interval_seconds: default_reconnect_interval_seconds(),
            read_idle_timeout_seconds: default_read_idle_timeout_seconds(),
            request_timeout_seconds: default_request_timeout_seconds(),
            enable_auto_update: false,
            auto_update_exit_code: EXIT_CODE_UNSET,
            package_root: default_package_root(),
            update_url: default_update_url(),
            systemd_unit: default_systemd_unit(),
        }
    }
}

/// Agent configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct AgentConfig {
    /// Control-plane session endpoint.
    pub endpoint: String,
    /// Identifier of this machine.
    pub machine_id: String,
    /// Control-plane token; may instead come from [`TOKEN_ENV_VAR`].
    #[serde(default)]
    pub token: Option<String>,
    /// Session tuning.
    #[serde(default)]
    pub session: SessionSection,
}

impl AgentConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse and validate configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Fill in the token from [`TOKEN_ENV_VAR`] when the file has none.
    ///
    /// A missing token is not an error; the legs then omit the header.
    pub fn load_token(&mut self) {
        if self.token.as_deref().is_some_and(|t| !t.is_empty()) {
            return;
        }
        match env::var(TOKEN_ENV_VAR) {
            Ok(value) if !value.is_empty() => self.token = Some(value),
            _ => {
                warn!(
                    env = TOKEN_ENV_VAR,
                    "no control-plane token configured; connecting without one"
                );
                self.token = None;
            }
        }
    }

    /// Convert into validated [`SessionOptions`].
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the resulting options are inconsistent.
    pub fn to_options(&self) -> Result<SessionOptions> {
        let options = SessionOptions {
            machine_id: self.machine_id.clone(),
            token: self.token.clone().filter(|t| !t.is_empty()),
            reconnect_interval: Duration::from_secs(self.session.reconnect_interval_seconds),
            read_idle_timeout: Duration::from_secs(self.session.read_idle_timeout_seconds),
            request_timeout: Duration::from_secs(self.session.request_timeout_seconds),
            enable_auto_update: self.session.enable_auto_update,
            auto_update_exit_code: self.session.auto_update_exit_code,
            package_root: self.session.package_root.clone(),
            update_url: self.session.update_url.clone(),
            systemd_unit: self.session.systemd_unit.clone(),
        };
        options.validate()?;
        Ok(options)
    }

    fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(AppError::Config("endpoint must not be empty".into()));
        }

        if self.machine_id.trim().is_empty() {
            return Err(AppError::Config("machine_id must not be empty".into()));
        }

        self.to_options().map(|_| ())
    }
}
