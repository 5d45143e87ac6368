//! Wire model module declarations.

use std::time::Duration;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Deserializer, Serializer};

pub mod body;
pub mod health;
pub mod request;
pub mod response;

/// RFC 3339 rendering of the zero timestamp used by the control plane for
/// "no time set".
pub(crate) const ZERO_TIME: &str = "0001-01-01T00:00:00Z";

/// Deserialize an optional RFC 3339 timestamp, treating `null`, a missing
/// field and the zero time (year 1) as unset.
pub(crate) fn deserialize_wire_time<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let parsed = Option::<DateTime<Utc>>::deserialize(deserializer)?;
    Ok(parsed.filter(|t| t.year() > 1))
}

/// Serialize an optional timestamp, writing the zero time when unset.
#[allow(clippy::ref_option)] // serde `serialize_with` hands us `&Option<T>`.
pub(crate) fn serialize_wire_time<S>(
    value: &Option<DateTime<Utc>>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(t) => serializer.serialize_str(&t.to_rfc3339()),
        None => serializer.serialize_str(ZERO_TIME),
    }
}

/// Deserialize a duration encoded as an integer count of nanoseconds.
///
/// Negative values are clamped to zero.
pub(crate) fn deserialize_nanos<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let nanos = Option::<i64>::deserialize(deserializer)?.unwrap_or_default();
    Ok(Duration::from_nanos(u64::try_from(nanos).unwrap_or(0)))
}

/// Serialize a duration as an integer count of nanoseconds.
pub(crate) fn serialize_nanos<S>(
    value: &Duration,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let nanos = i64::try_from(value.as_nanos()).unwrap_or(i64::MAX);
    serializer.serialize_i64(nanos)
}

/// Deserialize a field treating an explicit `null` like a missing field.
pub(crate) fn deserialize_null_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
