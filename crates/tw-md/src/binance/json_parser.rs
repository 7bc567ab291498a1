//! Binance JSON trade decoder.
//!
//! Handles the combined-stream wrapper and the bare payload:
//!
//! ```json
//! {"stream":"btcusdt@trade","data":{"e":"trade","E":1672515782136,"s":"BTCUSDT",
//!  "t":12345,"p":"0.001","q":"100","T":1672515782136,"m":true,"M":true}}
//! ```
//!
//! Binance echoes symbols in upper case (`BTCUSDT`) while subscriptions use
//! lower case (`btcusdt`), so symbols are lowered before the reverse lookup.

use std::sync::Arc;

use tw_core::error::FeedError;
use tw_core::pairs::PairTranslator;
use tw_core::Exchange;

use crate::json_util::{decimal_or_zero, str_field, timestamp_or_now};
use crate::normalizer::{
    DecodeError, Decoded, SkipReason, TradeDecoder, TradeEntry, TradeFactory, batch_outcome, parse_frame,
};

/// Build the subscription request for the `@trade` stream of each symbol.
pub fn build_subscribe(symbols: &[String]) -> String {
    let params: Vec<String> = symbols.iter().map(|s| format!("{}@trade", s.to_lowercase())).collect();
    serde_json::json!({
        "method": "SUBSCRIBE",
        "params": params,
        "id": 1
    })
    .to_string()
}

/// Decoder for Binance spot `trade` events.
pub struct BinanceDecoder {
    factory: TradeFactory,
}

impl BinanceDecoder {
    pub fn new(translator: Arc<PairTranslator>) -> Result<Self, FeedError> {
        Ok(Self { factory: TradeFactory::new(Exchange::Binance, translator)? })
    }

    fn parse_trade(&self, v: &serde_json::Value) -> Result<TradeEntry, DecodeError> {
        let sym = str_field(v, "s").ok_or_else(|| DecodeError::Schema("trade without symbol".into()))?;
        let Some(pair) = self.factory.canonical(&sym.to_lowercase()) else {
            return Ok(TradeEntry::Unmapped);
        };
        // Trade time first; event time if a payload ever lacks it.
        let ts_key = if v.get("T").is_some() { "T" } else { "E" };
        Ok(self.factory.build(
            pair,
            decimal_or_zero(Exchange::Binance, v, "p"),
            decimal_or_zero(Exchange::Binance, v, "q"),
            timestamp_or_now(Exchange::Binance, v, ts_key),
            v.get("m").and_then(|m| m.as_bool()).unwrap_or(false),
        ))
    }
}

impl TradeDecoder for BinanceDecoder {
    fn exchange(&self) -> Exchange {
        Exchange::Binance
    }

    fn decode(&self, raw: &[u8]) -> Result<Decoded, DecodeError> {
        let v = parse_frame(raw)?;

        // {"result":null,"id":1} answers SUBSCRIBE; {"code":..,"msg":..} reports errors.
        if v.get("id").is_some() && (v.get("result").is_some() || v.get("error").is_some()) {
            return Ok(Decoded::Skip(SkipReason::Control));
        }
        if v.get("code").is_some() && v.get("msg").is_some() {
            tracing::warn!("[binance] error notice: {v}");
            return Ok(Decoded::Skip(SkipReason::Control));
        }

        let data = v.get("data").unwrap_or(&v);
        let event = str_field(data, "e").ok_or_else(|| DecodeError::Schema("missing event type".into()))?;
        if event != "trade" {
            return Ok(Decoded::Skip(SkipReason::NonTrade));
        }
        Ok(batch_outcome([self.parse_trade(data)?]))
    }
}
