//! Time utilities and timestamp normalization.
//!
//! Exchanges report trade time in different units: Binance sends integer
//! epoch milliseconds, Kraken and Coinbase send RFC 3339 strings, and some
//! legacy feeds send epoch seconds as a (possibly fractional) numeric string.
//! Everything is normalized to **epoch milliseconds** here.

use std::time::{SystemTime, UNIX_EPOCH};

use chrono::DateTime;

/// Current time as **milliseconds** since Unix epoch.
#[inline]
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Parse epoch seconds given as a string (`"1534614057"` or
/// `"1534614057.321597"`) into epoch milliseconds.
pub fn ms_from_epoch_secs_str(s: &str) -> Option<i64> {
    let secs: f64 = s.trim().parse().ok()?;
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    Some((secs * 1000.0).round() as i64)
}

/// Parse an RFC 3339 timestamp (`"2023-09-25T07:49:37.708706Z"`) into epoch
/// milliseconds. Sub-millisecond precision is truncated.
pub fn ms_from_rfc3339(s: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(s.trim()).ok().map(|dt| dt.timestamp_millis())
}

/// Normalize a timestamp of unknown string encoding.
///
/// Numeric strings are read as epoch seconds; anything else must be RFC 3339.
pub fn ms_from_str(s: &str) -> Option<i64> {
    ms_from_epoch_secs_str(s).or_else(|| ms_from_rfc3339(s))
}
