//! Response returned to the control plane.

use serde::{Deserialize, Serialize};

use super::health::{ComponentEvents, ComponentHealthStates, ComponentMetrics};

/// Result of one handled request.
///
/// Only the collection matching the request method is populated; empty
/// collections and an absent error are omitted from the JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Response {
    /// Handler failure message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Per-component health states.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub states: Vec<ComponentHealthStates>,
    /// Per-component events.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<ComponentEvents>,
    /// Per-component metrics.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metrics: Vec<ComponentMetrics>,
}

impl Response {
    /// Empty acknowledgement.
    #[must_use]
    pub fn ack() -> Self {
        Self::default()
    }

    /// Response carrying only an error message.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }

    /// Whether the response reports a failure.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
