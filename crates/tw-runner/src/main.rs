//! # tw-runner
//!
//! Main entry point for the tradewire trade ingestion service.
//!
//! Loads a JSON configuration file, builds one connector per enabled
//! exchange, and runs them under the ingestion supervisor until Ctrl+C.
//!
//! # Usage
//!
//! ```bash
//! tw-runner config.json --log-level info
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, bail};
use clap::Parser;
use tracing::{info, warn};
use tw_core::backoff::TokioSleeper;
use tw_core::config::AppConfig;
use tw_core::history::{HistoryStore, MemoryHistoryStore, RedisHistoryStore};
use tw_md::connector::{ConnectorSettings, ExchangeConnector};
use tw_md::supervisor::IngestionSupervisor;

/// Multi-exchange trade ingestion runner.
#[derive(Parser)]
#[command(name = "tw-runner", about = "Multi-exchange trade ingestion runner")]
struct Cli {
    /// Configuration file path (JSON).
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Optional log directory for file output. Overrides `log_path`.
    #[arg(long)]
    log_dir: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1. Load configuration before logging so the file can name the log dir.
    let config = tw_core::config::load_config(&cli.config)?;
    let log_dir = cli.log_dir.clone().or_else(|| config.log_path.clone());
    tw_core::logging::init_logging(&cli.log_level, log_dir.as_deref(), &config.module_name());

    info!(
        "tw-runner starting: config={}, log_level={}, {} exchange entries",
        cli.config.display(),
        cli.log_level,
        config.exchanges.len()
    );

    // 2. Pair table and history store
    let translator = Arc::new(config.pair_translator()?);
    let store = open_store(&config).await?;

    // 3. One connector per enabled, mapped exchange
    let connectors = build_connectors(&config, &translator, store)?;
    if connectors.is_empty() {
        bail!("no exchange has any configured pair to track");
    }

    let mut supervisor = IngestionSupervisor::new(connectors);
    supervisor.start();
    info!("{} connector(s) started, press Ctrl+C to stop", supervisor.len());

    // 4. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    // 5. Drain every session
    supervisor.stop().await;
    for status in supervisor.statuses() {
        info!(
            "[{}] {} sessions, {} trades written, {} undecodable frames, {} store errors",
            status.exchange(),
            status.generation(),
            status.trades_written(),
            status.decode_errors(),
            status.store_errors()
        );
    }

    info!("goodbye");
    Ok(())
}

async fn open_store(config: &AppConfig) -> Result<Arc<dyn HistoryStore>> {
    let max_len = config.store.history_len;
    match &config.store.redis_url {
        Some(url) => Ok(Arc::new(RedisHistoryStore::connect(url, max_len, config.store.timeout()).await?)),
        None => {
            warn!("store.redis_url not set, trades are kept in memory only");
            Ok(Arc::new(MemoryHistoryStore::new(max_len)))
        }
    }
}

fn build_connectors(
    config: &AppConfig,
    translator: &Arc<tw_core::pairs::PairTranslator>,
    store: Arc<dyn HistoryStore>,
) -> Result<Vec<ExchangeConnector>> {
    let settings = ConnectorSettings::from_session(&config.session).with_store_timeout(config.store.timeout());
    let mut connectors = Vec::new();
    for (idx, entry) in config.exchanges.iter().enumerate() {
        let Some(feed) = tw_md::registry::create_feed(entry, &config.pairs, translator)? else {
            continue;
        };
        info!("exchanges[{idx}]: {} on {} ({} pairs)", feed.label, feed.ws_url, feed.native_pairs.len());
        connectors.push(ExchangeConnector::new(feed, store.clone(), Arc::new(TokioSleeper), settings.clone()));
    }
    Ok(connectors)
}
