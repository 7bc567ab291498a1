//! Feed descriptors.
//!
//! Each exchange module exposes a `build(..) -> FeedDef` function that
//! describes its single WebSocket stream: where to dial, what to send after
//! the handshake and how to decode what comes back. The connector is generic
//! over these descriptors, so adding an exchange never touches the session
//! state machine.

use std::sync::Arc;

use tw_core::Exchange;

use crate::normalizer::TradeDecoder;

/// Everything needed to run one exchange session.
#[derive(Clone)]
pub struct FeedDef {
    /// Human-readable label used in log lines (e.g. `"kraken_trades"`).
    pub label: String,
    pub exchange: Exchange,
    /// Streaming endpoint (e.g. `"wss://ws.kraken.com/v2"`).
    pub ws_url: String,
    /// Subscription message sent immediately after the handshake.
    pub subscribe_msg: String,
    /// Exchange-native symbols covered by `subscribe_msg`.
    pub native_pairs: Vec<String>,
    pub decoder: Arc<dyn TradeDecoder>,
}

impl std::fmt::Debug for FeedDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedDef")
            .field("label", &self.label)
            .field("exchange", &self.exchange)
            .field("ws_url", &self.ws_url)
            .field("native_pairs", &self.native_pairs)
            .finish_non_exhaustive()
    }
}
