//! Bounded per-key trade history.
//!
//! Each `(exchange, canonical pair)` owns one list in the external store,
//! newest entry first, capped at `max_len` entries:
//!
//! ```text
//! trades:kraken:BTCUSD   [t9, t8, t7, ... t0]    <- LPUSH at the head
//!                                     ^^^^^^^^    <- LTRIM drops the tail
//! ```
//!
//! [`HistoryStore::append`] is a single atomic push-and-trim, so writers
//! never do read-modify-write against the store and need no locking.
//! [`HistoryStore::latest`] is a point-in-time range read.
//!
//! Two backends are provided:
//!
//! 1. [`RedisHistoryStore`]: Redis lists via a multiplexed
//!    `ConnectionManager` (reconnects transparently).
//! 2. [`MemoryHistoryStore`]: in-process `VecDeque`s, for tests and dry runs.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use ahash::AHashMap;
use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use tracing::{info, warn};

use crate::error::FeedError;
use crate::types::{Exchange, Trade};

/// Namespace prefix shared by every trade list.
pub const KEY_PREFIX: &str = "trades";

/// Default number of trades retained per key.
pub const DEFAULT_HISTORY_LEN: usize = 100;

/// Store address of one trade list: `trades:{exchange}:{canonical_pair}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HistoryKey {
    key: String,
}

impl HistoryKey {
    pub fn new(exchange: Exchange, canonical_pair: &str) -> Self {
        Self { key: format!("{KEY_PREFIX}:{exchange}:{canonical_pair}") }
    }

    /// Key under which `trade` is stored.
    pub fn for_trade(trade: &Trade) -> Self {
        Self::new(trade.exchange(), trade.pair())
    }

    pub fn as_str(&self) -> &str {
        &self.key
    }
}

impl std::fmt::Display for HistoryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.key)
    }
}

/// Narrow interface over the bounded-list store.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Push `trade` to the front of `key` and trim the list to the store's
    /// maximum length, atomically.
    async fn append(&self, key: &HistoryKey, trade: &Trade) -> Result<(), FeedError>;

    /// Up to `count` raw entries, most recent first.
    async fn latest(&self, key: &HistoryKey, count: usize) -> Result<Vec<String>, FeedError>;

    /// [`latest`](Self::latest) decoded into trades. Entries that fail to
    /// decode are logged and skipped.
    async fn latest_trades(&self, key: &HistoryKey, count: usize) -> Result<Vec<Trade>, FeedError> {
        let raw = self.latest(key, count).await?;
        Ok(raw
            .iter()
            .filter_map(|entry| match serde_json::from_str::<Trade>(entry) {
                Ok(t) => Some(t),
                Err(e) => {
                    warn!("[history] undecodable entry under {key}: {e}");
                    None
                }
            })
            .collect())
    }
}

fn encode(key: &HistoryKey, trade: &Trade) -> Result<String, FeedError> {
    serde_json::to_string(trade).map_err(|e| FeedError::Store(format!("encode for {key}: {e}")))
}

// ---------------------------------------------------------------------------
// Redis
// ---------------------------------------------------------------------------

/// Redis-backed history store.
pub struct RedisHistoryStore {
    conn: ConnectionManager,
    max_len: usize,
}

impl RedisHistoryStore {
    /// Connect to `url` (e.g. `redis://127.0.0.1:6379/0`) and verify the
    /// connection with a `PING`.
    ///
    /// `timeout` bounds the whole connect and every later command, including
    /// the ones issued after a transparent reconnect.
    pub async fn connect(url: &str, max_len: usize, timeout: Duration) -> Result<Self, FeedError> {
        if max_len == 0 {
            return Err(FeedError::Config("history_len must be at least 1".into()));
        }
        let client = redis::Client::open(url)?;
        let config = ConnectionManagerConfig::new()
            .set_connection_timeout(timeout)
            .set_response_timeout(timeout)
            .set_number_of_retries(1);
        let handshake = async {
            let mut conn = client.get_connection_manager_with_config(config).await?;
            let _: String = redis::cmd("PING").query_async(&mut conn).await?;
            Ok::<_, FeedError>(conn)
        };
        let conn = tokio::time::timeout(timeout, handshake)
            .await
            .map_err(|_| FeedError::Store(format!("redis connect timed out after {timeout:?}")))??;
        info!("[history] connected to redis, max_len={max_len}, timeout={timeout:?}");
        Ok(Self { conn, max_len })
    }
}

#[async_trait]
impl HistoryStore for RedisHistoryStore {
    async fn append(&self, key: &HistoryKey, trade: &Trade) -> Result<(), FeedError> {
        let value = encode(key, trade)?;
        let mut conn = self.conn.clone();
        let stop = self.max_len as isize - 1;
        let (): () = redis::pipe()
            .atomic()
            .lpush(key.as_str(), value)
            .ignore()
            .ltrim(key.as_str(), 0, stop)
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn latest(&self, key: &HistoryKey, count: usize) -> Result<Vec<String>, FeedError> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let mut conn = self.conn.clone();
        let entries: Vec<String> = redis::cmd("LRANGE")
            .arg(key.as_str())
            .arg(0)
            .arg(count as isize - 1)
            .query_async(&mut conn)
            .await?;
        Ok(entries)
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// In-process history store with the same push-and-trim semantics.
pub struct MemoryHistoryStore {
    lists: Mutex<AHashMap<String, VecDeque<String>>>,
    max_len: usize,
}

impl MemoryHistoryStore {
    pub fn new(max_len: usize) -> Self {
        Self { lists: Mutex::new(AHashMap::new()), max_len: max_len.max(1) }
    }

    /// Current length of the list under `key`.
    pub fn len(&self, key: &HistoryKey) -> usize {
        self.lists.lock().map(|l| l.get(key.as_str()).map_or(0, VecDeque::len)).unwrap_or(0)
    }

    /// Total number of keys written so far.
    pub fn key_count(&self) -> usize {
        self.lists.lock().map(|l| l.len()).unwrap_or(0)
    }
}

impl Default for MemoryHistoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LEN)
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn append(&self, key: &HistoryKey, trade: &Trade) -> Result<(), FeedError> {
        let value = encode(key, trade)?;
        let mut lists = self.lists.lock().map_err(|_| FeedError::Store("memory store poisoned".into()))?;
        let list = lists.entry(key.as_str().to_string()).or_default();
        list.push_front(value);
        list.truncate(self.max_len);
        Ok(())
    }

    async fn latest(&self, key: &HistoryKey, count: usize) -> Result<Vec<String>, FeedError> {
        let lists = self.lists.lock().map_err(|_| FeedError::Store("memory store poisoned".into()))?;
        Ok(lists.get(key.as_str()).map(|l| l.iter().take(count).cloned().collect()).unwrap_or_default())
    }
}
