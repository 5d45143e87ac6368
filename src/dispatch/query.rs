//! `states`, `events` and `metrics` handlers.
//!
//! Each handler walks the target component set in order. A name that the
//! registry does not know still gets an entry (named, empty) so the control
//! plane can tell "unknown" from "missing"; an accessor failure is logged and
//! leaves that component's collection empty. Only a "no data" events result
//! omits the component entirely.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::time::Instant;
use tracing::{debug, error, warn};

use crate::components::ComponentRegistry;
use crate::models::health::{ComponentEvents, ComponentHealthStates, ComponentMetrics};
use crate::models::request::Request;
use crate::{AppError, Result};

/// Look-back window used when a request carries no `since`.
pub const DEFAULT_QUERY_SINCE: Duration = Duration::from_secs(30 * 60);

/// Await `call` unless `deadline` passes first.
pub(crate) async fn with_deadline<T>(
    deadline: Instant,
    call: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout_at(deadline, call)
        .await
        .map_err(|_| AppError::Command("request timed out".into()))?
}

/// `now - since`, or `now - DEFAULT_QUERY_SINCE` when `since` is zero or
/// does not fit the calendar.
#[must_use]
pub fn since_window(now: DateTime<Utc>, since: Duration) -> DateTime<Utc> {
    let lookback = if since.is_zero() {
        DEFAULT_QUERY_SINCE
    } else {
        since
    };
    TimeDelta::from_std(lookback)
        .ok()
        .and_then(|delta| now.checked_sub_signed(delta))
        .or_else(|| {
            TimeDelta::from_std(DEFAULT_QUERY_SINCE)
                .ok()
                .and_then(|delta| now.checked_sub_signed(delta))
        })
        .unwrap_or(now)
}

/// Window `[start, end]` for an `events` request.
#[must_use]
pub fn events_window(request: &Request, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = request
        .start_time
        .unwrap_or_else(|| since_window(now, request.since));
    let end = request.end_time.unwrap_or(now);
    (start, end)
}

pub(crate) async fn states(
    registry: &dyn ComponentRegistry,
    targets: &[String],
    deadline: Instant,
) -> Vec<ComponentHealthStates> {
    let mut out = Vec::with_capacity(targets.len());
    for name in targets {
        let mut entry = ComponentHealthStates {
            component: name.clone(),
            states: Vec::new(),
        };

        let component = match registry.get_component(name) {
            Ok(component) => component,
            Err(err) => {
                error!(operation = "states", component = %name, %err, "failed to get component");
                out.push(entry);
                continue;
            }
        };

        debug!(component = %name, "getting states");
        match with_deadline(deadline, component.states()).await {
            Ok(states) => entry.states = states,
            Err(err) => {
                error!(operation = "states", component = %name, %err, "failed to invoke component states");
            }
        }
        out.push(entry);
    }
    out
}

pub(crate) async fn events(
    registry: &dyn ComponentRegistry,
    targets: &[String],
    request: &Request,
    deadline: Instant,
) -> Vec<ComponentEvents> {
    let (start, end) = events_window(request, Utc::now());

    let mut out = Vec::with_capacity(targets.len());
    for name in targets {
        let mut entry = ComponentEvents {
            component: name.clone(),
            start_time: start,
            end_time: end,
            events: Vec::new(),
        };

        let component = match registry.get_component(name) {
            Ok(component) => component,
            Err(err) => {
                error!(operation = "events", component = %name, %err, "failed to get component");
                out.push(entry);
                continue;
            }
        };

        match with_deadline(deadline, component.events(start)).await {
            Ok(mut events) => {
                events.retain(|event| event.time <= end);
                entry.events = events;
            }
            Err(AppError::NoData(reason)) => {
                warn!(component = %name, reason, "no events found");
                continue;
            }
            Err(err) => {
                error!(operation = "events", component = %name, %err, "failed to invoke component events");
            }
        }
        out.push(entry);
    }
    out
}

pub(crate) async fn metrics(
    registry: &dyn ComponentRegistry,
    targets: &[String],
    request: &Request,
    deadline: Instant,
) -> Vec<ComponentMetrics> {
    let since = since_window(Utc::now(), request.since);

    let mut out = Vec::with_capacity(targets.len());
    for name in targets {
        let mut entry = ComponentMetrics {
            component: name.clone(),
            metrics: Vec::new(),
        };

        let component = match registry.get_component(name) {
            Ok(component) => component,
            Err(err) => {
                error!(operation = "metrics", component = %name, %err, "failed to get component");
                out.push(entry);
                continue;
            }
        };

        match with_deadline(deadline, component.metrics(since)).await {
            Ok(metrics) => entry.metrics = metrics,
            Err(err) => {
                error!(operation = "metrics", component = %name, %err, "failed to invoke component metrics");
            }
        }
        out.push(entry);
    }
    out
}
