//! Exchange session state machine and restart loop.
//!
//! One [`ExchangeConnector`] owns one feed. Each session walks
//!
//! ```text
//! Disconnected → Connecting → Subscribing → Streaming → Draining → Disconnected
//!       ^                                                               |
//!       +------------------- backoff delay (Sleeper) ------------------+
//! ```
//!
//! Streaming ends on transport close, on the periodic refresh deadline or on
//! shutdown. Refresh and shutdown close gracefully: a close frame is sent and
//! the reader gets `close_timeout` to see the peer's reply before it is
//! aborted. The loop only exits on shutdown.
//!
//! The reader task awaits every store append before reading the next frame,
//! so trades for a key reach the store in wire order. Each append is bounded
//! by `store_timeout`; a write that does not finish in time is counted as a
//! store error and the stream moves on.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, trace, warn};
use tw_core::Exchange;
use tw_core::backoff::{Backoff, Sleeper};
use tw_core::config::{SessionConfig, StoreConfig};
use tw_core::error::FeedError;
use tw_core::history::{HistoryKey, HistoryStore};

use crate::feed::FeedDef;
use crate::normalizer::Decoded;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Longest slice of an undecodable frame included in a log line.
const LOG_FRAME_BYTES: usize = 256;

/// Transitions buffered per lagging observer.
const TRANSITION_BUFFER: usize = 64;

/// Where a connector is in its session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Subscribing,
    Streaming,
    Draining,
}

/// Timing for one connector.
#[derive(Debug, Clone)]
pub struct ConnectorSettings {
    pub refresh_interval: Duration,
    pub close_timeout: Duration,
    pub connect_timeout: Duration,
    /// Bound on a single history append.
    pub store_timeout: Duration,
    pub backoff: Backoff,
}

impl ConnectorSettings {
    pub fn from_session(cfg: &SessionConfig) -> Self {
        Self {
            refresh_interval: cfg.refresh_interval(),
            close_timeout: cfg.close_timeout(),
            connect_timeout: cfg.connect_timeout(),
            store_timeout: StoreConfig::default().timeout(),
            backoff: cfg.backoff(),
        }
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }
}

impl Default for ConnectorSettings {
    fn default() -> Self {
        Self::from_session(&SessionConfig::default())
    }
}

/// Live counters and state of one connector, shared with observers.
#[derive(Debug)]
pub struct ConnectorStatus {
    exchange: Exchange,
    state: watch::Sender<SessionState>,
    transitions: broadcast::Sender<SessionState>,
    generation: AtomicU64,
    trades_written: AtomicU64,
    decode_errors: AtomicU64,
    store_errors: AtomicU64,
}

impl ConnectorStatus {
    fn new(exchange: Exchange) -> Self {
        let (state, _) = watch::channel(SessionState::Disconnected);
        let (transitions, _) = broadcast::channel(TRANSITION_BUFFER);
        Self {
            exchange,
            state,
            transitions,
            generation: AtomicU64::new(0),
            trades_written: AtomicU64::new(0),
            decode_errors: AtomicU64::new(0),
            store_errors: AtomicU64::new(0),
        }
    }

    pub fn exchange(&self) -> Exchange {
        self.exchange
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Receiver for the current state. Quick successive transitions may be
    /// coalesced; use [`transitions`](Self::transitions) to see each one.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Every state entered from now on, in order.
    pub fn transitions(&self) -> broadcast::Receiver<SessionState> {
        self.transitions.subscribe()
    }

    /// Number of sessions started so far (1 for the first dial).
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Relaxed)
    }

    pub fn trades_written(&self) -> u64 {
        self.trades_written.load(Ordering::Relaxed)
    }

    pub fn decode_errors(&self) -> u64 {
        self.decode_errors.load(Ordering::Relaxed)
    }

    pub fn store_errors(&self) -> u64 {
        self.store_errors.load(Ordering::Relaxed)
    }

    fn set_state(&self, state: SessionState) {
        self.state.send_replace(state);
        let _ = self.transitions.send(state);
    }
}

/// Resolves once shutdown is requested or the sender is gone.
async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    Shutdown,
    Refresh,
    /// The peer or the network ended the stream after `frames` frames.
    TransportClosed { frames: u64 },
}

/// Runs one exchange feed until shutdown.
#[derive(Clone)]
pub struct ExchangeConnector {
    feed: Arc<FeedDef>,
    store: Arc<dyn HistoryStore>,
    sleeper: Arc<dyn Sleeper>,
    settings: ConnectorSettings,
    status: Arc<ConnectorStatus>,
}

impl ExchangeConnector {
    pub fn new(
        feed: FeedDef,
        store: Arc<dyn HistoryStore>,
        sleeper: Arc<dyn Sleeper>,
        settings: ConnectorSettings,
    ) -> Self {
        let status = Arc::new(ConnectorStatus::new(feed.exchange));
        Self { feed: Arc::new(feed), store, sleeper, settings, status }
    }

    pub fn label(&self) -> &str {
        &self.feed.label
    }

    pub fn exchange(&self) -> Exchange {
        self.feed.exchange
    }

    pub fn status(&self) -> Arc<ConnectorStatus> {
        self.status.clone()
    }

    /// Restart loop. Returns once `shutdown` becomes `true` (or its sender
    /// is dropped) and the current session has drained.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let label = self.feed.label.as_str();
        let mut backoff = self.settings.backoff.clone();

        info!("[{label}] starting, {} pairs on {}", self.feed.native_pairs.len(), self.feed.ws_url);

        loop {
            if *shutdown.borrow() {
                break;
            }
            let generation = self.status.generation.fetch_add(1, Ordering::Relaxed) + 1;
            debug!("[{label}] session {generation} starting");

            match self.run_session(&mut shutdown).await {
                Ok(SessionEnd::Shutdown) => break,
                Ok(SessionEnd::Refresh) => {
                    info!("[{label}] session {generation} refreshed");
                    backoff.reset();
                }
                Ok(SessionEnd::TransportClosed { frames }) => {
                    warn!("[{label}] session {generation} closed by transport after {frames} frames");
                    if frames > 0 {
                        backoff.reset();
                    }
                }
                Err(e) => error!("[{label}] session {generation} failed: {e}"),
            }
            self.status.set_state(SessionState::Disconnected);

            let delay = backoff.next_delay();
            info!("[{label}] reconnecting in {delay:?}");
            tokio::select! {
                _ = self.sleeper.sleep(delay) => {}
                _ = stopped(&mut shutdown) => break,
            }
        }

        self.status.set_state(SessionState::Disconnected);
        info!("[{label}] stopped");
    }

    async fn run_session(&self, shutdown: &mut watch::Receiver<bool>) -> Result<SessionEnd, FeedError> {
        let label = self.feed.label.as_str();

        self.status.set_state(SessionState::Connecting);
        info!("[{label}] connecting to {}", self.feed.ws_url);
        let ws = tokio::select! {
            res = self.connect_ws() => res?,
            _ = stopped(shutdown) => return Ok(SessionEnd::Shutdown),
        };
        let (mut ws_write, ws_read) = ws.split();

        self.status.set_state(SessionState::Subscribing);
        debug!("[{label}] subscribing: {}", self.feed.subscribe_msg);
        ws_write
            .send(Message::Text(self.feed.subscribe_msg.clone().into()))
            .await
            .map_err(|e| FeedError::WebSocket(format!("subscribe send failed: {e}")))?;

        self.status.set_state(SessionState::Streaming);
        info!("[{label}] streaming");
        let mut reader = tokio::spawn(self.clone().read_loop(ws_read));

        let end = tokio::select! {
            res = &mut reader => {
                let frames = match res {
                    Ok(frames) => frames,
                    Err(e) => {
                        error!("[{label}] reader task failed: {e}");
                        0
                    }
                };
                // Nothing left to read; release the write half without a close handshake.
                self.status.set_state(SessionState::Draining);
                drop(ws_write);
                return Ok(SessionEnd::TransportClosed { frames });
            }
            _ = stopped(shutdown) => SessionEnd::Shutdown,
            _ = tokio::time::sleep(self.settings.refresh_interval) => SessionEnd::Refresh,
        };

        self.status.set_state(SessionState::Draining);
        self.drain(ws_write, reader).await;
        Ok(end)
    }

    async fn connect_ws(&self) -> Result<WsStream, FeedError> {
        let url = self.feed.ws_url.as_str();
        match tokio::time::timeout(self.settings.connect_timeout, tokio_tungstenite::connect_async(url)).await {
            Ok(Ok((stream, _response))) => Ok(stream),
            Ok(Err(e)) => Err(FeedError::WebSocket(format!("connect {url}: {e}"))),
            Err(_) => Err(FeedError::WebSocket(format!(
                "connect {url}: no handshake within {:?}",
                self.settings.connect_timeout
            ))),
        }
    }

    /// Send a close frame and give the reader `close_timeout` to observe the
    /// peer's reply. The reader is aborted either way.
    async fn drain(&self, mut ws_write: SplitSink<WsStream, Message>, mut reader: JoinHandle<u64>) {
        let label = self.feed.label.as_str();
        let closing = async {
            if let Err(e) = ws_write.close().await {
                debug!("[{label}] close frame not sent: {e}");
            }
            let _ = (&mut reader).await;
        };
        if tokio::time::timeout(self.settings.close_timeout, closing).await.is_err() {
            warn!("[{label}] peer did not finish close within {:?}", self.settings.close_timeout);
        }
        reader.abort();
    }

    /// Read frames until the stream ends. Returns the number of data frames.
    async fn read_loop(self, mut ws_read: SplitStream<WsStream>) -> u64 {
        let label = self.feed.label.as_str();
        let mut frames = 0u64;
        while let Some(msg) = ws_read.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    frames += 1;
                    self.ingest(text.as_bytes()).await;
                }
                Ok(Message::Binary(data)) => {
                    frames += 1;
                    self.ingest(&data).await;
                }
                Ok(Message::Close(frame)) => info!("[{label}] close frame received: {frame:?}"),
                // Pings are answered by tungstenite.
                Ok(_) => {}
                Err(e) => {
                    warn!("[{label}] read error: {e}");
                    break;
                }
            }
        }
        frames
    }

    /// Decode one frame and append its trades. Never fails: bad frames and
    /// store errors are logged and counted.
    async fn ingest(&self, raw: &[u8]) {
        let label = self.feed.label.as_str();
        match self.feed.decoder.decode(raw) {
            Ok(Decoded::Trades(trades)) => {
                for trade in trades {
                    let key = HistoryKey::for_trade(&trade);
                    let timeout = self.settings.store_timeout;
                    match tokio::time::timeout(timeout, self.store.append(&key, &trade)).await {
                        Ok(Ok(())) => {
                            self.status.trades_written.fetch_add(1, Ordering::Relaxed);
                            trace!("[{label}] {key} <- {} @ {}", trade.quantity(), trade.price());
                        }
                        Ok(Err(e)) => {
                            self.status.store_errors.fetch_add(1, Ordering::Relaxed);
                            error!("[{label}] append to {key} failed: {e}");
                        }
                        Err(_) => {
                            self.status.store_errors.fetch_add(1, Ordering::Relaxed);
                            error!("[{label}] append to {key} timed out after {timeout:?}");
                        }
                    }
                }
            }
            Ok(Decoded::Skip(reason)) => trace!("[{label}] skipped frame: {reason:?}"),
            Err(e) => {
                self.status.decode_errors.fetch_add(1, Ordering::Relaxed);
                let shown = &raw[..raw.len().min(LOG_FRAME_BYTES)];
                warn!("[{label}] undecodable frame: {e}; raw={}", String::from_utf8_lossy(shown));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;
    use tw_core::Trade;
    use tw_core::backoff::RecordingSleeper;
    use tw_core::history::MemoryHistoryStore;
    use tw_core::pairs::PairTranslator;

    use super::*;

    const KRAKEN_TRADE: &str = r#"{"channel":"trade","type":"update","data":[{"symbol":"BTC/USD","side":"sell","price":65000.5,"qty":0.01,"ord_type":"market","trade_id":1,"timestamp":"2023-09-25T07:49:37.708706Z"}]}"#;

    fn settings(refresh: Duration) -> ConnectorSettings {
        ConnectorSettings {
            refresh_interval: refresh,
            close_timeout: Duration::from_millis(200),
            connect_timeout: Duration::from_secs(2),
            store_timeout: Duration::from_millis(100),
            backoff: Backoff::new(Duration::from_millis(10), Duration::from_millis(40), 0.0),
        }
    }

    fn connector(url: String, refresh: Duration) -> (ExchangeConnector, Arc<MemoryHistoryStore>, RecordingSleeper) {
        let store = Arc::new(MemoryHistoryStore::new(100));
        let (c, sleeper) = connector_with_store(url, refresh, store.clone());
        (c, store, sleeper)
    }

    fn connector_with_store(
        url: String,
        refresh: Duration,
        store: Arc<dyn HistoryStore>,
    ) -> (ExchangeConnector, RecordingSleeper) {
        let feed = crate::kraken::build(Some(&url), vec!["BTC/USD".into()], Arc::new(PairTranslator::with_defaults()))
            .unwrap();
        let sleeper = RecordingSleeper::new();
        let c = ExchangeConnector::new(feed, store, Arc::new(sleeper.clone()), settings(refresh));
        (c, sleeper)
    }

    fn kraken_trade(price: f64) -> String {
        serde_json::json!({
            "channel": "trade",
            "type": "update",
            "data": [{
                "symbol": "BTC/USD", "side": "buy", "price": price, "qty": 0.5,
                "ord_type": "limit", "trade_id": 7, "timestamp": "2023-09-25T07:49:37.708706Z"
            }]
        })
        .to_string()
    }

    /// Serves one session that sends `frames` and then stays open.
    async fn serve_frames(listener: TcpListener, frames: Vec<String>) {
        tokio::spawn(async move {
            while let Ok((tcp, _)) = listener.accept().await {
                let frames = frames.clone();
                tokio::spawn(async move {
                    let mut ws = accept_async(tcp).await.unwrap();
                    let _ = ws.next().await;
                    for f in frames {
                        ws.send(Message::Text(f.into())).await.unwrap();
                    }
                    while let Some(Ok(_)) = ws.next().await {}
                });
            }
        });
    }

    /// Fails every second append and stores the rest.
    struct FlakyStore {
        inner: MemoryHistoryStore,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl HistoryStore for FlakyStore {
        async fn append(&self, key: &HistoryKey, trade: &Trade) -> Result<(), FeedError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) % 2 == 1 {
                return Err(FeedError::Store("connection reset".into()));
            }
            self.inner.append(key, trade).await
        }

        async fn latest(&self, key: &HistoryKey, count: usize) -> Result<Vec<String>, FeedError> {
            self.inner.latest(key, count).await
        }
    }

    /// Never completes a write.
    struct StalledStore;

    #[async_trait]
    impl HistoryStore for StalledStore {
        async fn append(&self, _key: &HistoryKey, _trade: &Trade) -> Result<(), FeedError> {
            std::future::pending().await
        }

        async fn latest(&self, _key: &HistoryKey, _count: usize) -> Result<Vec<String>, FeedError> {
            Ok(Vec::new())
        }
    }

    async fn wait_until(mut cond: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !cond() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    async fn local_listener() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        (listener, url)
    }

    #[tokio::test]
    async fn writes_trades_and_reconnects_after_close() {
        let (listener, url) = local_listener().await;
        let (sub_tx, mut sub_rx) = tokio::sync::mpsc::unbounded_channel::<String>();
        tokio::spawn(async move {
            let mut n = 0;
            while let Ok((tcp, _)) = listener.accept().await {
                n += 1;
                let sub_tx = sub_tx.clone();
                tokio::spawn(async move {
                    let mut ws = accept_async(tcp).await.unwrap();
                    if let Some(Ok(Message::Text(sub))) = ws.next().await {
                        let _ = sub_tx.send(sub.as_str().to_owned());
                    }
                    if n == 1 {
                        ws.send(Message::Text(KRAKEN_TRADE.to_string().into())).await.unwrap();
                        ws.send(Message::Text(r#"{"channel":"heartbeat"}"#.to_string().into())).await.unwrap();
                        ws.send(Message::Text("{garbage".to_string().into())).await.unwrap();
                        let _ = ws.close(None).await;
                    }
                    while let Some(Ok(_)) = ws.next().await {}
                });
            }
        });

        let (c, store, _sleeper) = connector(url, Duration::from_secs(3600));
        let status = c.status();
        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(async move { c.run(stop_rx).await });

        wait_until(|| status.generation() >= 2 && status.state() == SessionState::Streaming).await;
        assert_eq!(status.trades_written(), 1);
        assert_eq!(status.decode_errors(), 1);

        let sub: serde_json::Value = serde_json::from_str(&sub_rx.recv().await.unwrap()).unwrap();
        assert_eq!(sub["params"]["symbol"], serde_json::json!(["BTC/USD"]));

        let key = HistoryKey::new(Exchange::Kraken, "BTCUSD");
        let stored = store.latest_trades(&key, 10).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].price(), 65000.5);
        assert!(stored[0].is_buyer_maker());

        stop_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle).await.unwrap().unwrap();
        assert_eq!(status.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn refresh_tears_down_and_redials() {
        let (listener, url) = local_listener().await;
        let accepted = Arc::new(AtomicUsize::new(0));
        let counter = accepted.clone();
        tokio::spawn(async move {
            while let Ok((tcp, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(async move {
                    let mut ws = accept_async(tcp).await.unwrap();
                    while let Some(Ok(_)) = ws.next().await {}
                });
            }
        });

        let (c, _store, sleeper) = connector(url, Duration::from_millis(100));
        let status = c.status();
        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(async move { c.run(stop_rx).await });

        wait_until(|| accepted.load(Ordering::SeqCst) >= 3).await;
        stop_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle).await.unwrap().unwrap();

        assert!(status.generation() >= 3);
        let delays = sleeper.delays();
        assert!(delays.len() >= 2);
        assert!(delays.iter().all(|d| *d == Duration::from_millis(10)), "{delays:?}");
    }

    #[tokio::test]
    async fn shutdown_is_bounded_when_peer_ignores_close() {
        let (listener, url) = local_listener().await;
        tokio::spawn(async move {
            while let Ok((tcp, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let _ws = accept_async(tcp).await.unwrap();
                    tokio::time::sleep(Duration::from_secs(60)).await;
                });
            }
        });

        let (c, _store, _sleeper) = connector(url, Duration::from_secs(3600));
        let status = c.status();
        let mut states = status.subscribe();
        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(async move { c.run(stop_rx).await });

        tokio::time::timeout(Duration::from_secs(5), states.wait_for(|s| *s == SessionState::Streaming))
            .await
            .unwrap()
            .unwrap();

        let started = tokio::time::Instant::now();
        stop_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle).await.unwrap().unwrap();
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(status.generation(), 1);
        assert_eq!(status.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn dial_failures_back_off_exponentially() {
        let (listener, url) = local_listener().await;
        drop(listener);

        let (c, _store, sleeper) = connector(url, Duration::from_secs(3600));
        let status = c.status();
        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(async move { c.run(stop_rx).await });

        wait_until(|| sleeper.delays().len() >= 4).await;
        stop_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle).await.unwrap().unwrap();

        let ms: Vec<u128> = sleeper.delays().iter().take(4).map(|d| d.as_millis()).collect();
        assert_eq!(ms, vec![10, 20, 40, 40]);
        assert!(status.generation() >= 4);
        assert_eq!(status.trades_written(), 0);
    }

    #[tokio::test]
    async fn store_failures_are_counted_and_streaming_continues() {
        let (listener, url) = local_listener().await;
        serve_frames(listener, (1..=4).map(|i| kraken_trade(100.0 * i as f64)).collect()).await;

        let store = Arc::new(FlakyStore { inner: MemoryHistoryStore::new(10), calls: AtomicUsize::new(0) });
        let (c, _sleeper) = connector_with_store(url, Duration::from_secs(3600), store.clone());
        let status = c.status();
        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(async move { c.run(stop_rx).await });

        wait_until(|| status.trades_written() + status.store_errors() == 4).await;
        assert_eq!(status.trades_written(), 2);
        assert_eq!(status.store_errors(), 2);
        assert_eq!(status.state(), SessionState::Streaming);
        assert_eq!(status.generation(), 1);

        let key = HistoryKey::new(Exchange::Kraken, "BTCUSD");
        let prices: Vec<f64> = store.latest_trades(&key, 10).await.unwrap().iter().map(Trade::price).collect();
        assert_eq!(prices, vec![300.0, 100.0]);

        stop_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn stalled_store_does_not_block_the_stream() {
        let (listener, url) = local_listener().await;
        serve_frames(listener, vec![kraken_trade(1.0), kraken_trade(2.0), kraken_trade(3.0)]).await;

        let (c, _sleeper) = connector_with_store(url, Duration::from_secs(3600), Arc::new(StalledStore));
        let status = c.status();
        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(async move { c.run(stop_rx).await });

        wait_until(|| status.store_errors() == 3).await;
        assert_eq!(status.trades_written(), 0);
        assert_eq!(status.state(), SessionState::Streaming);

        stop_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle).await.unwrap().unwrap();
        assert_eq!(status.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn transport_close_passes_through_draining() {
        let (listener, url) = local_listener().await;
        tokio::spawn(async move {
            let mut first = true;
            while let Ok((tcp, _)) = listener.accept().await {
                let close_now = std::mem::take(&mut first);
                tokio::spawn(async move {
                    let mut ws = accept_async(tcp).await.unwrap();
                    let _ = ws.next().await;
                    if close_now {
                        let _ = ws.close(None).await;
                    }
                    while let Some(Ok(_)) = ws.next().await {}
                });
            }
        });

        let (c, _store, _sleeper) = connector(url, Duration::from_secs(3600));
        let status = c.status();
        let mut transitions = status.transitions();
        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(async move { c.run(stop_rx).await });

        let mut seen = Vec::new();
        tokio::time::timeout(Duration::from_secs(5), async {
            while seen.iter().filter(|s| **s == SessionState::Streaming).count() < 2 {
                seen.push(transitions.recv().await.unwrap());
            }
        })
        .await
        .expect("second session never streamed");

        use SessionState::*;
        assert_eq!(
            seen,
            vec![Connecting, Subscribing, Streaming, Draining, Disconnected, Connecting, Subscribing, Streaming]
        );

        stop_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn already_stopped_never_dials() {
        let (c, _store, sleeper) = connector("ws://127.0.0.1:9".into(), Duration::from_secs(3600));
        let status = c.status();
        let (_stop_tx, stop_rx) = watch::channel(true);
        c.run(stop_rx).await;
        assert_eq!(status.generation(), 0);
        assert!(sleeper.delays().is_empty());
    }
}
