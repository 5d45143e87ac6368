//! Built-in component describing the session agent itself.

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::{DateTime, Utc};

use super::{BoxFuture, Component};
use crate::models::health::{Event, EventType, HealthState, HealthStateType, Metric};
use crate::Result;

/// Registered name of the built-in component.
pub const AGENT_COMPONENT: &str = "agent";

/// Reports the agent as healthy for as long as the process answers, with
/// its version and uptime.
pub struct AgentComponent {
    started: Instant,
    started_at: DateTime<Utc>,
}

impl AgentComponent {
    /// Create the component, capturing the process start time.
    #[must_use]
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            started_at: Utc::now(),
        }
    }

    fn uptime_seconds(&self) -> u64 {
        self.started.elapsed().as_secs()
    }
}

impl Default for AgentComponent {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for AgentComponent {
    fn name(&self) -> &str {
        AGENT_COMPONENT
    }

    fn states(&self) -> BoxFuture<'_, Result<Vec<HealthState>>> {
        Box::pin(async move {
            let mut state = HealthState::new(AGENT_COMPONENT, HealthStateType::Healthy, "");
            state.extra_info = BTreeMap::from([
                ("version".to_owned(), env!("CARGO_PKG_VERSION").to_owned()),
                ("uptime_seconds".to_owned(), self.uptime_seconds().to_string()),
            ]);
            Ok(vec![state])
        })
    }

    fn events(&self, since: DateTime<Utc>) -> BoxFuture<'_, Result<Vec<Event>>> {
        Box::pin(async move {
            if self.started_at < since {
                return Ok(Vec::new());
            }
            Ok(vec![Event {
                component: AGENT_COMPONENT.to_owned(),
                time: self.started_at,
                name: "agent_started".to_owned(),
                event_type: EventType::Info,
                message: format!("agent {} started", env!("CARGO_PKG_VERSION")),
            }])
        })
    }

    fn metrics(&self, _since: DateTime<Utc>) -> BoxFuture<'_, Result<Vec<Metric>>> {
        Box::pin(async move {
            #[allow(clippy::cast_precision_loss)] // uptime in seconds stays far below 2^52.
            let value = self.uptime_seconds() as f64;
            Ok(vec![Metric {
                unix_seconds: Utc::now().timestamp(),
                name: "agent_uptime_seconds".to_owned(),
                labels: BTreeMap::new(),
                value,
            }])
        })
    }
}
