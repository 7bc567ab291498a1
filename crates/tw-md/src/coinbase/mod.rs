//! Coinbase spot trades over the Advanced Trade WebSocket.

pub mod json_parser;

use std::sync::Arc;

use tw_core::Exchange;
use tw_core::error::FeedError;
use tw_core::pairs::PairTranslator;

use self::json_parser::CoinbaseDecoder;
use crate::feed::FeedDef;

pub const COINBASE_WS_URL: &str = "wss://advanced-trade-ws.coinbase.com";

/// Build the Coinbase feed for the given product ids (`BTC-USD`, ...).
pub fn build(
    ws_url: Option<&str>,
    native_pairs: Vec<String>,
    translator: Arc<PairTranslator>,
) -> Result<FeedDef, FeedError> {
    Ok(FeedDef {
        label: "coinbase_trades".into(),
        exchange: Exchange::Coinbase,
        ws_url: ws_url.unwrap_or(COINBASE_WS_URL).into(),
        subscribe_msg: json_parser::build_subscribe(&native_pairs),
        native_pairs,
        decoder: Arc::new(CoinbaseDecoder::new(translator)?),
    })
}
