//! Health, event and metric payloads reported by components.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Health level of a component state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum HealthStateType {
    /// Component operating normally.
    Healthy,
    /// Component failing in a way that affects workloads.
    Unhealthy,
    /// Component impaired without affecting workloads.
    Degraded,
    /// Component has not produced its first check yet.
    Initializing,
}

/// One evaluated health state of a component.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthState {
    /// When the state was evaluated.
    pub time: DateTime<Utc>,
    /// Owning component name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub component: String,
    /// State name; may differ from the component name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Health level.
    pub health: HealthStateType,
    /// Why the component is in this state.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
    /// Detailed error text when unhealthy.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
    /// Free-form additional data.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra_info: BTreeMap<String, String>,
}

impl HealthState {
    /// Build a state evaluated now with the given health and reason.
    #[must_use]
    pub fn new(component: &str, health: HealthStateType, reason: impl Into<String>) -> Self {
        Self {
            time: Utc::now(),
            component: component.to_owned(),
            name: component.to_owned(),
            health,
            reason: reason.into(),
            error: String::new(),
            extra_info: BTreeMap::new(),
        }
    }
}

/// Severity of a component event.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum EventType {
    /// Unclassified.
    #[default]
    Unknown,
    /// Informative, no action needed.
    Info,
    /// Issue expected to recover automatically.
    Warning,
    /// Workload-impacting issue requiring attention.
    Critical,
    /// Fatal or hardware issue requiring immediate action.
    Fatal,
}

/// Something that happened in a component at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Event {
    /// Component that generated the event.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub component: String,
    /// When the event happened.
    pub time: DateTime<Utc>,
    /// Event name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Event severity.
    #[serde(rename = "type", default)]
    pub event_type: EventType,
    /// Human-readable detail.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

/// One metric sample.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Metric {
    /// Sample time as Unix seconds.
    pub unix_seconds: i64,
    /// Metric name.
    pub name: String,
    /// Optional metric labels.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// Sample value.
    pub value: f64,
}

/// Health states of one component.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ComponentHealthStates {
    /// Component name.
    pub component: String,
    /// Evaluated states; empty when the component could not be queried.
    #[serde(default)]
    pub states: Vec<HealthState>,
}

/// Events of one component over a time window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ComponentEvents {
    /// Component name.
    pub component: String,
    /// Window start.
    #[serde(rename = "startTime")]
    pub start_time: DateTime<Utc>,
    /// Window end.
    #[serde(rename = "endTime")]
    pub end_time: DateTime<Utc>,
    /// Events inside the window.
    #[serde(default)]
    pub events: Vec<Event>,
}

/// Metric samples of one component.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ComponentMetrics {
    /// Component name.
    pub component: String,
    /// Samples since the requested point in time.
    #[serde(default)]
    pub metrics: Vec<Metric>,
}
