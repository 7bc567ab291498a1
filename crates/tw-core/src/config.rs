//! Configuration parsing for the tradewire ingestion system.
//!
//! Everything is read from a single JSON file. Only `exchanges` is required;
//! every other block falls back to defaults.
//!
//! # Example config
//!
//! ```json
//! {
//!   "module_name": "tradewire",
//!   "log_path": "/var/log/tradewire",
//!   "pairs": ["BTCUSD", "BTCUSDT", "ETHUSD"],
//!   "store": { "redis_url": "redis://127.0.0.1:6379/0", "history_len": 100, "timeout_ms": 2000 },
//!   "session": { "refresh_interval_sec": 3600, "close_timeout_ms": 1000 },
//!   "exchanges": [
//!     { "exchange": "binance" },
//!     { "exchange": "kraken", "ws_url": "wss://ws.kraken.com/v2" },
//!     { "exchange": "coinbase", "pairs": ["BTCUSD"], "enabled": false }
//!   ]
//! }
//! ```

use std::time::Duration;

use serde::Deserialize;

use crate::backoff::Backoff;
use crate::error::FeedError;
use crate::history::DEFAULT_HISTORY_LEN;
use crate::pairs::{PairMappingTable, PairTranslator};
use crate::types::Exchange;

/// Top-level application config, deserialized from a JSON file.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Used as the log file prefix.
    pub module_name: Option<String>,

    /// Directory for daily-rotating log files.
    pub log_path: Option<String>,

    /// Canonical pairs tracked on every exchange unless overridden.
    #[serde(default = "default_pairs")]
    pub pairs: Vec<String>,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub session: SessionConfig,

    /// One entry per exchange feed.
    pub exchanges: Vec<ExchangeConfig>,

    /// Replaces the built-in pair table when present.
    pub pair_mappings: Option<PairMappingTable>,
}

impl AppConfig {
    /// Returns the module name, defaulting to `"tradewire"`.
    pub fn module_name(&self) -> String {
        self.module_name.clone().unwrap_or_else(|| "tradewire".to_string())
    }

    /// Build the pair translator described by this config.
    pub fn pair_translator(&self) -> Result<PairTranslator, FeedError> {
        match &self.pair_mappings {
            Some(table) => PairTranslator::new(table),
            None => Ok(PairTranslator::with_defaults()),
        }
    }

    /// Check the parts of the config that serde cannot.
    pub fn validate(&self) -> Result<(), FeedError> {
        if self.exchanges.is_empty() {
            return Err(FeedError::Config("no exchanges configured".into()));
        }
        if self.store.history_len == 0 {
            return Err(FeedError::Config("store.history_len must be at least 1".into()));
        }
        if self.store.timeout_ms == 0 {
            return Err(FeedError::Config("store.timeout_ms must be at least 1".into()));
        }
        if self.session.refresh_interval_sec == 0 {
            return Err(FeedError::Config("session.refresh_interval_sec must be at least 1".into()));
        }
        let mut seen = Vec::new();
        for ex in &self.exchanges {
            let exchange = ex.exchange()?;
            if seen.contains(&exchange) {
                return Err(FeedError::Config(format!("exchange {exchange} configured twice")));
            }
            seen.push(exchange);
        }
        Ok(())
    }
}

fn default_pairs() -> Vec<String> {
    vec!["BTCUSD".into(), "BTCUSDT".into(), "ETHUSD".into(), "ETHUSDT".into()]
}

/// History store connection parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// `redis://host:port/db`. Without it an in-memory store is used.
    pub redis_url: Option<String>,

    /// Maximum entries kept per `(exchange, pair)` list.
    #[serde(default = "default_history_len")]
    pub history_len: usize,

    /// Bound on connecting and on every store command. A write that takes
    /// longer counts as a store error.
    #[serde(default = "default_store_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { redis_url: None, history_len: DEFAULT_HISTORY_LEN, timeout_ms: default_store_timeout_ms() }
    }
}

impl StoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_history_len() -> usize {
    DEFAULT_HISTORY_LEN
}

fn default_store_timeout_ms() -> u64 {
    2000
}

/// Session lifecycle timing shared by all connectors.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Streaming sessions are torn down and re-dialed after this long. Must
    /// be at least one second.
    pub refresh_interval_sec: u64,
    /// How long to wait for the peer to acknowledge a close frame.
    pub close_timeout_ms: u64,
    /// Bound on the TCP/TLS/WebSocket handshake.
    pub connect_timeout_ms: u64,
    /// Minimum delay between sessions.
    pub backoff_initial_ms: u64,
    /// Cap for the exponential restart delay.
    pub backoff_max_ms: u64,
    /// Random extra delay, as a fraction of the current delay.
    pub backoff_jitter: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            refresh_interval_sec: 3600,
            close_timeout_ms: 1000,
            connect_timeout_ms: 10_000,
            backoff_initial_ms: 1000,
            backoff_max_ms: 30_000,
            backoff_jitter: 0.2,
        }
    }
}

impl SessionConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_sec)
    }

    pub fn close_timeout(&self) -> Duration {
        Duration::from_millis(self.close_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn backoff(&self) -> Backoff {
        Backoff::new(
            Duration::from_millis(self.backoff_initial_ms),
            Duration::from_millis(self.backoff_max_ms),
            self.backoff_jitter,
        )
    }
}

/// A single exchange feed.
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeConfig {
    /// Exchange identifier: `"binance"`, `"kraken"`, `"coinbase"`.
    pub exchange: String,

    /// Streaming endpoint override. Each exchange has a built-in default.
    pub ws_url: Option<String>,

    /// Canonical pairs for this exchange, overriding the top-level list.
    pub pairs: Option<Vec<String>>,

    /// Set to `false` to keep an entry in the file without starting it.
    pub enabled: Option<bool>,
}

impl ExchangeConfig {
    pub fn exchange(&self) -> Result<Exchange, FeedError> {
        self.exchange.parse()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    /// Pairs to track: the per-exchange list, else the global one.
    pub fn effective_pairs<'a>(&'a self, global: &'a [String]) -> &'a [String] {
        self.pairs.as_deref().unwrap_or(global)
    }
}

/// Parse a JSON config document.
pub fn parse_config(content: &str) -> Result<AppConfig, FeedError> {
    let config: AppConfig = serde_json::from_str(content).map_err(|e| FeedError::Config(e.to_string()))?;
    config.validate()?;
    Ok(config)
}

/// Load and parse a JSON config file.
pub fn load_config(path: &std::path::Path) -> Result<AppConfig, FeedError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| FeedError::Config(format!("cannot read {}: {e}", path.display())))?;
    parse_config(&content)
}
