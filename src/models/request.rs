//! Command request sent by the control plane.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    deserialize_nanos, deserialize_null_default, deserialize_wire_time, serialize_nanos,
    serialize_wire_time,
};

/// Command vocabulary understood by the dispatcher.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    /// Reboot the host.
    Reboot,
    /// Fetch component metrics.
    Metrics,
    /// Fetch component health states.
    States,
    /// Fetch component events.
    Events,
    /// Mark installed packages for removal.
    Delete,
    /// Update a package or the agent itself.
    Update,
    /// Missing or unrecognised method.
    #[default]
    #[serde(other)]
    Unknown,
}

impl Method {
    /// Wire name of the method.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Reboot => "reboot",
            Self::Metrics => "metrics",
            Self::States => "states",
            Self::Events => "events",
            Self::Delete => "delete",
            Self::Update => "update",
            Self::Unknown => "unknown",
        }
    }
}

/// Request decoded from [`Body::data`](crate::models::body::Body::data).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Request {
    /// Command to run.
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub method: Method,
    /// Target components; empty means every component known at session start.
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "deserialize_null_default"
    )]
    pub components: Vec<String>,
    /// Start of the query window.
    #[serde(
        default,
        serialize_with = "serialize_wire_time",
        deserialize_with = "deserialize_wire_time"
    )]
    pub start_time: Option<DateTime<Utc>>,
    /// End of the query window.
    #[serde(
        default,
        serialize_with = "serialize_wire_time",
        deserialize_with = "deserialize_wire_time"
    )]
    pub end_time: Option<DateTime<Utc>>,
    /// Look-back window; zero selects the default.
    #[serde(
        default,
        serialize_with = "serialize_nanos",
        deserialize_with = "deserialize_nanos"
    )]
    pub since: Duration,
    /// Target version for `update`: `"pkg:version"` or a bare agent version.
    #[serde(
        default,
        skip_serializing_if = "String::is_empty",
        deserialize_with = "deserialize_null_default"
    )]
    pub update_version: String,
}

impl Request {
    /// Build a request for `method` with every other field defaulted.
    #[must_use]
    pub fn new(method: Method) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    /// Classify `update_version` into a package or self-update target.
    #[must_use]
    pub fn update_target(&self) -> UpdateTarget<'_> {
        let mut parts = self.update_version.split(':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(package), Some(version), None) => UpdateTarget::Package { package, version },
            _ => UpdateTarget::SelfUpdate {
                version: &self.update_version,
            },
        }
    }
}

/// What an `update` request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateTarget<'a> {
    /// Pin `package` to `version`.
    Package {
        /// Package name.
        package: &'a str,
        /// Package version.
        version: &'a str,
    },
    /// Replace the agent itself with `version` (may be empty).
    SelfUpdate {
        /// Target agent version.
        version: &'a str,
    },
}
