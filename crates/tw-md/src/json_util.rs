//! Shared JSON parsing helpers used by all exchange decoders.
//!
//! Exchanges encode numbers inconsistently: Binance and Coinbase send prices
//! as strings (`"30000.5"`), Kraken v2 sends native numbers. Timestamps are
//! integer milliseconds, epoch-second strings or RFC 3339 strings depending
//! on the venue.

use tracing::warn;
use tw_core::{Exchange, time_util};

/// Parse a JSON value (string or number) as `f64`.
#[inline]
pub fn parse_str_f64(v: Option<&serde_json::Value>) -> Option<f64> {
    let v = v?;
    if let Some(s) = v.as_str() {
        fast_float2::parse(s).ok()
    } else {
        v.as_f64()
    }
}

/// Parse a numeric field, degrading to `0.0` on failure.
///
/// A bad field does not abort the whole message, but it is never silent:
/// the raw value is logged so bad data can be traced. A zero price is then
/// rejected by trade validation.
pub fn decimal_or_zero(exchange: Exchange, v: &serde_json::Value, key: &str) -> f64 {
    match parse_str_f64(v.get(key)) {
        Some(n) if n.is_finite() => n,
        _ => {
            let raw = v.get(key).map(|r| r.to_string()).unwrap_or_else(|| "<missing>".into());
            warn!("[{exchange}] unparseable {key} field, using 0: raw={raw}");
            0.0
        }
    }
}

/// Parse a timestamp field into epoch milliseconds.
///
/// Integers are taken as milliseconds; strings as epoch seconds or RFC 3339.
pub fn parse_timestamp_ms(v: Option<&serde_json::Value>) -> Option<i64> {
    let v = v?;
    if let Some(n) = v.as_i64() {
        return Some(n);
    }
    if let Some(s) = v.as_str() {
        return time_util::ms_from_str(s);
    }
    None
}

/// Timestamp in epoch ms, falling back to local receive time (with a warning)
/// when the field is missing or malformed.
pub fn timestamp_or_now(exchange: Exchange, v: &serde_json::Value, key: &str) -> i64 {
    parse_timestamp_ms(v.get(key)).unwrap_or_else(|| {
        let raw = v.get(key).map(|r| r.to_string()).unwrap_or_else(|| "<missing>".into());
        warn!("[{exchange}] unparseable {key} timestamp, using receive time: raw={raw}");
        time_util::now_ms()
    })
}

/// Read a string field.
#[inline]
pub fn str_field<'a>(v: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    v.get(key)?.as_str()
}

/// `side == "sell"` means the buyer provided liquidity. Case-insensitive, so
/// `"SELL"` (Coinbase) and `"sell"` (Kraken) agree.
#[inline]
pub fn is_buyer_maker_from_side(side: Option<&str>) -> bool {
    side.is_some_and(|s| s.eq_ignore_ascii_case("sell"))
}
