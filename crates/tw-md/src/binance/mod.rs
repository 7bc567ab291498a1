//! Binance spot trades: one combined stream subscribed with `SUBSCRIBE`.

pub mod json_parser;

use std::sync::Arc;

use tw_core::Exchange;
use tw_core::error::FeedError;
use tw_core::pairs::PairTranslator;

use self::json_parser::BinanceDecoder;
use crate::feed::FeedDef;

pub const BINANCE_WS_URL: &str = "wss://stream.binance.com:9443/stream";

/// Build the Binance feed for the given native symbols (`btcusdt`, ...).
pub fn build(
    ws_url: Option<&str>,
    native_pairs: Vec<String>,
    translator: Arc<PairTranslator>,
) -> Result<FeedDef, FeedError> {
    Ok(FeedDef {
        label: "binance_trades".into(),
        exchange: Exchange::Binance,
        ws_url: ws_url.unwrap_or(BINANCE_WS_URL).into(),
        subscribe_msg: json_parser::build_subscribe(&native_pairs),
        native_pairs,
        decoder: Arc::new(BinanceDecoder::new(translator)?),
    })
}
