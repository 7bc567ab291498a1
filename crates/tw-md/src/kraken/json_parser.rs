//! Kraken v2 JSON trade decoder.
//!
//! Trade messages:
//!
//! ```json
//! {"channel":"trade","type":"update","data":[{"symbol":"BTC/USD","side":"sell",
//!  "price":65000.5,"qty":0.01,"ord_type":"market","trade_id":4665906,
//!  "timestamp":"2023-09-25T07:49:37.708706Z"}]}
//! ```
//!
//! Method responses (`{"method":"subscribe","success":true,..}`), pongs and
//! the `heartbeat`/`status` channels carry no trades.

use std::sync::Arc;

use tracing::warn;
use tw_core::Exchange;
use tw_core::error::FeedError;
use tw_core::pairs::PairTranslator;

use crate::json_util::{decimal_or_zero, is_buyer_maker_from_side, str_field, timestamp_or_now};
use crate::normalizer::{
    DecodeError, Decoded, SkipReason, TradeDecoder, TradeEntry, TradeFactory, batch_outcome, parse_frame,
};

/// Build the v2 `trade` subscription. Snapshots are not requested.
pub fn build_subscribe(symbols: &[String]) -> String {
    serde_json::json!({
        "method": "subscribe",
        "params": {
            "channel": "trade",
            "symbol": symbols,
            "snapshot": false
        }
    })
    .to_string()
}

pub struct KrakenDecoder {
    factory: TradeFactory,
}

impl KrakenDecoder {
    pub fn new(translator: Arc<PairTranslator>) -> Result<Self, FeedError> {
        Ok(Self { factory: TradeFactory::new(Exchange::Kraken, translator)? })
    }

    fn parse_trade(&self, v: &serde_json::Value) -> Result<TradeEntry, DecodeError> {
        let sym = str_field(v, "symbol").ok_or_else(|| DecodeError::Schema("trade without symbol".into()))?;
        let Some(pair) = self.factory.canonical(sym) else {
            return Ok(TradeEntry::Unmapped);
        };
        Ok(self.factory.build(
            pair,
            decimal_or_zero(Exchange::Kraken, v, "price"),
            decimal_or_zero(Exchange::Kraken, v, "qty"),
            timestamp_or_now(Exchange::Kraken, v, "timestamp"),
            is_buyer_maker_from_side(str_field(v, "side")),
        ))
    }
}

impl TradeDecoder for KrakenDecoder {
    fn exchange(&self) -> Exchange {
        Exchange::Kraken
    }

    fn decode(&self, raw: &[u8]) -> Result<Decoded, DecodeError> {
        let v = parse_frame(raw)?;

        if let Some(method) = str_field(&v, "method") {
            if v.get("success").and_then(|s| s.as_bool()) == Some(false) {
                let error = str_field(&v, "error").unwrap_or("unknown error");
                warn!("[kraken] {method} failed: {error}");
            }
            return Ok(Decoded::Skip(SkipReason::Control));
        }

        let channel = str_field(&v, "channel").ok_or_else(|| DecodeError::Schema("missing channel".into()))?;
        match channel {
            "heartbeat" | "status" => return Ok(Decoded::Skip(SkipReason::Control)),
            "trade" => {}
            _ => return Ok(Decoded::Skip(SkipReason::NonTrade)),
        }

        if str_field(&v, "type") == Some("snapshot") {
            return Ok(Decoded::Skip(SkipReason::Snapshot));
        }
        let data = v
            .get("data")
            .and_then(|d| d.as_array())
            .ok_or_else(|| DecodeError::Schema("trade message without data array".into()))?;

        let entries = data.iter().map(|t| self.parse_trade(t)).collect::<Result<Vec<_>, _>>()?;
        Ok(batch_outcome(entries))
    }
}
