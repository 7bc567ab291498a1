//! Feed registry: builds the [`FeedDef`] for a configured exchange.

use std::sync::Arc;

use tracing::{info, warn};
use tw_core::Exchange;
use tw_core::config::ExchangeConfig;
use tw_core::error::FeedError;
use tw_core::pairs::PairTranslator;

use crate::feed::FeedDef;

/// Create the feed described by one `exchanges[]` entry.
///
/// Returns `Ok(None)` when the entry is disabled or none of its pairs have a
/// mapping on that exchange. Unknown exchanges and malformed URLs are
/// configuration errors.
pub fn create_feed(
    cfg: &ExchangeConfig,
    global_pairs: &[String],
    translator: &Arc<PairTranslator>,
) -> Result<Option<FeedDef>, FeedError> {
    let exchange = cfg.exchange()?;
    if !cfg.is_enabled() {
        info!("[{exchange}] disabled in config, skipping");
        return Ok(None);
    }
    if let Some(url) = &cfg.ws_url {
        validate_ws_url(url)?;
    }

    let native = translator.batch_to_exchange_format(cfg.effective_pairs(global_pairs), exchange)?;
    if native.is_empty() {
        warn!("[{exchange}] none of the configured pairs are listed, skipping");
        return Ok(None);
    }

    let ws_url = cfg.ws_url.as_deref();
    let feed = match exchange {
        Exchange::Binance => crate::binance::build(ws_url, native, translator.clone())?,
        Exchange::Kraken => crate::kraken::build(ws_url, native, translator.clone())?,
        Exchange::Coinbase => crate::coinbase::build(ws_url, native, translator.clone())?,
    };
    Ok(Some(feed))
}

fn validate_ws_url(raw: &str) -> Result<(), FeedError> {
    let url = url::Url::parse(raw).map_err(|e| FeedError::Config(format!("invalid ws_url {raw}: {e}")))?;
    match url.scheme() {
        "ws" | "wss" => Ok(()),
        other => Err(FeedError::Config(format!("ws_url {raw} has scheme {other}, expected ws or wss"))),
    }
}
