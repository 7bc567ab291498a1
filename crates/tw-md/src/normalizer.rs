//! Decoder interface shared by all exchange normalizers.
//!
//! Every exchange module provides a [`TradeDecoder`] that turns one raw
//! WebSocket frame into zero or more canonical [`Trade`]s. The three outcomes
//! are kept distinct because the connector reacts differently to each:
//!
//! - `Ok(Decoded::Trades(..))`: written to the history store in order
//! - `Ok(Decoded::Skip(..))`: acks, heartbeats, untracked pairs; ignored
//! - `Err(DecodeError)`: malformed frame; logged, the read loop continues

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};
use tw_core::error::FeedError;
use tw_core::pairs::PairTranslator;
use tw_core::{Exchange, Trade};

/// Why a well-formed frame produced no trades.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Subscription ack, heartbeat, status or error notice.
    Control,
    /// A data message on a channel other than trades.
    NonTrade,
    /// Every trade in the frame was for a pair this system does not track.
    Unmapped,
    /// Historical snapshot sent on subscribe.
    Snapshot,
    /// Every trade in the frame failed validation (e.g. non-positive price).
    Rejected,
    /// A trade envelope with no trades in it.
    Empty,
}

/// One trade inside a frame, after pair lookup and validation.
#[derive(Debug, Clone, PartialEq)]
pub enum TradeEntry {
    Accepted(Trade),
    Unmapped,
    Rejected,
}

/// Result of decoding one well-formed frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Trades(Vec<Trade>),
    Skip(SkipReason),
}

/// Frame could not be understood at all.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("frame is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("frame is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unexpected message shape: {0}")]
    Schema(String),
}

/// Per-exchange wire decoder.
pub trait TradeDecoder: Send + Sync {
    fn exchange(&self) -> Exchange;

    fn decode(&self, raw: &[u8]) -> Result<Decoded, DecodeError>;
}

/// Parse a raw frame as JSON.
pub fn parse_frame(raw: &[u8]) -> Result<serde_json::Value, DecodeError> {
    let text = std::str::from_utf8(raw)?;
    Ok(serde_json::from_str(text.trim())?)
}

/// Pair lookup and trade validation shared by the exchange decoders.
#[derive(Debug, Clone)]
pub struct TradeFactory {
    exchange: Exchange,
    translator: Arc<PairTranslator>,
}

impl TradeFactory {
    /// Fails if the translator has no table for `exchange`.
    pub fn new(exchange: Exchange, translator: Arc<PairTranslator>) -> Result<Self, FeedError> {
        if !translator.supports(exchange) {
            return Err(FeedError::UnsupportedExchange(exchange.to_string()));
        }
        Ok(Self { exchange, translator })
    }

    pub fn exchange(&self) -> Exchange {
        self.exchange
    }

    /// Canonical pair for a native symbol, or `None` on a mapping-miss.
    pub fn canonical(&self, native: &str) -> Option<&str> {
        let found = self.translator.to_canonical_format(native, self.exchange).ok().flatten();
        if found.is_none() {
            debug!("[{}] untracked symbol {native}, skipping", self.exchange);
        }
        found
    }

    /// Build a validated trade. Trades that break the invariants (e.g. a
    /// price that failed to parse and degraded to zero) are logged and
    /// rejected.
    pub fn build(&self, pair: &str, price: f64, quantity: f64, timestamp_ms: i64, is_buyer_maker: bool) -> TradeEntry {
        match Trade::new(self.exchange, pair, price, quantity, timestamp_ms, is_buyer_maker) {
            Ok(t) => TradeEntry::Accepted(t),
            Err(e) => {
                warn!("[{}] rejected trade for {pair}: {e}", self.exchange);
                TradeEntry::Rejected
            }
        }
    }
}

/// Collapse the entries of one frame into an outcome, keeping wire order.
///
/// A frame with no accepted trades is skipped: as `Rejected` if any trade
/// failed validation, else `Unmapped`, or `Empty` if it carried no trades.
pub fn batch_outcome(entries: impl IntoIterator<Item = TradeEntry>) -> Decoded {
    let mut trades = Vec::new();
    let mut seen = false;
    let mut rejected = false;
    for entry in entries {
        seen = true;
        match entry {
            TradeEntry::Accepted(t) => trades.push(t),
            TradeEntry::Rejected => rejected = true,
            TradeEntry::Unmapped => {}
        }
    }
    match (trades.is_empty(), seen, rejected) {
        (false, _, _) => Decoded::Trades(trades),
        (true, false, _) => Decoded::Skip(SkipReason::Empty),
        (true, true, true) => Decoded::Skip(SkipReason::Rejected),
        (true, true, false) => Decoded::Skip(SkipReason::Unmapped),
    }
}
