//! Timestamp helpers shared by records, stages, and observability surfaces.

use chrono::{DateTime, Utc};

/// A UTC timestamp as used throughout the pipeline.
pub type Timestamp = DateTime<Utc>;

/// Returns the current UTC time.
#[must_use]
pub fn now_utc() -> Timestamp {
    Utc::now()
}

/// Returns the current UTC time as an RFC3339 string with second precision.
///
/// This is the wire format for `createdAt`/`updatedAt` on execution records:
/// `YYYY-MM-DDTHH:MM:SSZ`.
///
/// # Examples
///
/// ```
/// use conveyor::utils::rfc3339_timestamp;
///
/// let ts = rfc3339_timestamp();
/// assert!(ts.contains('T'));
/// assert!(ts.ends_with('Z'));
/// ```
#[must_use]
pub fn rfc3339_timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Returns the current unix time in whole seconds.
#[must_use]
pub fn unix_seconds() -> i64 {
    Utc::now().timestamp()
}
