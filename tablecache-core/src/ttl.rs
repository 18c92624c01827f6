//! Expiration arithmetic shared by entries and the pool.
//!
//! The table stores expirations as integer epoch seconds; everything above
//! the backend works with `DateTime<Utc>`.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::time::Duration;

/// Hit rule: a stored row is live while its expiration is strictly after `now`.
pub fn is_live(stored: bool, expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    stored && expires_at.map_or(true, |at| at > now)
}

/// Absolute expiration `ttl` after `now`.
///
/// Returns `None` (never expires) when the instant cannot be represented.
pub fn expires_after(now: DateTime<Utc>, ttl: Duration) -> Option<DateTime<Utc>> {
    ChronoDuration::from_std(ttl)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
}

/// Encode an expiration for the ttl attribute.
pub fn to_epoch_seconds(instant: DateTime<Utc>) -> i64 {
    instant.timestamp()
}

/// Decode a ttl attribute. Out-of-range values yield `None`.
pub fn from_epoch_seconds(secs: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
}
