//! Error types shared across the session agent.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Invalid option combination or unreadable configuration.
    Config(String),
    /// Network or HTTP failure on one of the session legs.
    Transport(String),
    /// Malformed wire envelope or embedded request.
    Protocol(String),
    /// Command handler rejected or failed a request.
    Command(String),
    /// Requested component is not registered.
    NotFound(String),
    /// Component has no data for the requested window.
    NoData(String),
    /// Updater collaborator failure.
    Update(String),
    /// Host operation (reboot, systemd probe) failure.
    Host(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Transport(msg) => write!(f, "transport: {msg}"),
            Self::Protocol(msg) => write!(f, "protocol: {msg}"),
            Self::Command(msg) => write!(f, "command: {msg}"),
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
            Self::NoData(msg) => write!(f, "no data: {msg}"),
            Self::Update(msg) => write!(f, "update: {msg}"),
            Self::Host(msg) => write!(f, "host: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Protocol(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
