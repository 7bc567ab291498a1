//! Coinbase Advanced Trade `market_trades` decoder.
//!
//! ```json
//! {"channel":"market_trades","client_id":"","timestamp":"2023-02-09T20:19:35.39625135Z",
//!  "sequence_num":0,"events":[{"type":"update","trades":[{"trade_id":"000000000",
//!  "product_id":"ETH-USD","price":"1260.01","size":"0.3","side":"BUY",
//!  "time":"2019-08-14T20:42:27.265Z"}]}]}
//! ```
//!
//! One frame may carry several events, each with several trades. Snapshot
//! events (recent history replayed on subscribe) are skipped.

use std::sync::Arc;

use tracing::warn;
use tw_core::Exchange;
use tw_core::error::FeedError;
use tw_core::pairs::PairTranslator;

use crate::json_util::{decimal_or_zero, is_buyer_maker_from_side, str_field, timestamp_or_now};
use crate::normalizer::{
    DecodeError, Decoded, SkipReason, TradeDecoder, TradeEntry, TradeFactory, batch_outcome, parse_frame,
};

pub fn build_subscribe(product_ids: &[String]) -> String {
    serde_json::json!({
        "type": "subscribe",
        "product_ids": product_ids,
        "channel": "market_trades"
    })
    .to_string()
}

pub struct CoinbaseDecoder {
    factory: TradeFactory,
}

impl CoinbaseDecoder {
    pub fn new(translator: Arc<PairTranslator>) -> Result<Self, FeedError> {
        Ok(Self { factory: TradeFactory::new(Exchange::Coinbase, translator)? })
    }

    fn parse_trade(&self, v: &serde_json::Value) -> Result<TradeEntry, DecodeError> {
        let product = str_field(v, "product_id").ok_or_else(|| DecodeError::Schema("trade without product_id".into()))?;
        let Some(pair) = self.factory.canonical(product) else {
            return Ok(TradeEntry::Unmapped);
        };
        Ok(self.factory.build(
            pair,
            decimal_or_zero(Exchange::Coinbase, v, "price"),
            decimal_or_zero(Exchange::Coinbase, v, "size"),
            timestamp_or_now(Exchange::Coinbase, v, "time"),
            is_buyer_maker_from_side(str_field(v, "side")),
        ))
    }
}

impl TradeDecoder for CoinbaseDecoder {
    fn exchange(&self) -> Exchange {
        Exchange::Coinbase
    }

    fn decode(&self, raw: &[u8]) -> Result<Decoded, DecodeError> {
        let v = parse_frame(raw)?;

        if str_field(&v, "type") == Some("error") {
            warn!("[coinbase] error message: {}", str_field(&v, "message").unwrap_or("<none>"));
            return Ok(Decoded::Skip(SkipReason::Control));
        }

        let channel = str_field(&v, "channel").ok_or_else(|| DecodeError::Schema("missing channel".into()))?;
        match channel {
            "subscriptions" | "heartbeats" => return Ok(Decoded::Skip(SkipReason::Control)),
            "market_trades" => {}
            _ => return Ok(Decoded::Skip(SkipReason::NonTrade)),
        }

        let events = v
            .get("events")
            .and_then(|e| e.as_array())
            .ok_or_else(|| DecodeError::Schema("market_trades message without events".into()))?;

        let mut entries = Vec::new();
        let mut snapshot_only = !events.is_empty();
        for event in events {
            if str_field(event, "type") == Some("snapshot") {
                continue;
            }
            snapshot_only = false;
            let trades = event
                .get("trades")
                .and_then(|t| t.as_array())
                .ok_or_else(|| DecodeError::Schema("event without trades array".into()))?;
            for t in trades {
                entries.push(self.parse_trade(t)?);
            }
        }

        if snapshot_only {
            return Ok(Decoded::Skip(SkipReason::Snapshot));
        }
        Ok(batch_outcome(entries))
    }
}
