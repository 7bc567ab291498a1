//! Kraken spot trades over the v2 WebSocket API.

pub mod json_parser;

use std::sync::Arc;

use tw_core::Exchange;
use tw_core::error::FeedError;
use tw_core::pairs::PairTranslator;

use self::json_parser::KrakenDecoder;
use crate::feed::FeedDef;

pub const KRAKEN_WS_URL: &str = "wss://ws.kraken.com/v2";

/// Build the Kraken feed for the given native symbols (`BTC/USD`, ...).
pub fn build(
    ws_url: Option<&str>,
    native_pairs: Vec<String>,
    translator: Arc<PairTranslator>,
) -> Result<FeedDef, FeedError> {
    Ok(FeedDef {
        label: "kraken_trades".into(),
        exchange: Exchange::Kraken,
        ws_url: ws_url.unwrap_or(KRAKEN_WS_URL).into(),
        subscribe_msg: json_parser::build_subscribe(&native_pairs),
        native_pairs,
        decoder: Arc::new(KrakenDecoder::new(translator)?),
    })
}
