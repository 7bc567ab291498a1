//! Ingestion supervisor: one supervised task per exchange connector.
//!
//! The supervisor starts every connector with a shared shutdown signal and
//! restarts any connector whose task panics or returns while no shutdown was
//! requested. One exchange failing never affects the others.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::connector::{ConnectorStatus, ExchangeConnector};

/// Delay before a crashed connector is started again.
const DEFAULT_RESTART_DELAY: Duration = Duration::from_secs(1);

pub struct IngestionSupervisor {
    connectors: Vec<ExchangeConnector>,
    restart_delay: Duration,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl IngestionSupervisor {
    pub fn new(connectors: Vec<ExchangeConnector>) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self { connectors, restart_delay: DEFAULT_RESTART_DELAY, shutdown_tx, tasks: Vec::new() }
    }

    pub fn with_restart_delay(mut self, delay: Duration) -> Self {
        self.restart_delay = delay;
        self
    }

    pub fn len(&self) -> usize {
        self.connectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connectors.is_empty()
    }

    pub fn statuses(&self) -> Vec<Arc<ConnectorStatus>> {
        self.connectors.iter().map(|c| c.status()).collect()
    }

    /// Spawn one supervised task per connector. Calling it twice is a no-op.
    pub fn start(&mut self) {
        if !self.tasks.is_empty() {
            warn!("supervisor already started");
            return;
        }
        for connector in &self.connectors {
            info!("[{}] supervising {} connector", connector.label(), connector.exchange());
            self.tasks.push(tokio::spawn(supervise(
                connector.clone(),
                self.shutdown_tx.subscribe(),
                self.restart_delay,
            )));
        }
    }

    /// Signal shutdown and wait for every connector to drain.
    pub async fn stop(&mut self) {
        self.shutdown_tx.send_replace(true);
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                error!("supervisor task failed: {e}");
            }
        }
        info!("all connectors stopped");
    }
}

async fn supervise(connector: ExchangeConnector, mut shutdown: watch::Receiver<bool>, restart_delay: Duration) {
    let label = connector.label().to_string();
    loop {
        let runner = connector.clone();
        let rx = shutdown.clone();
        let result = tokio::spawn(async move { runner.run(rx).await }).await;

        if *shutdown.borrow() {
            break;
        }
        match result {
            Ok(()) => warn!("[{label}] connector exited without shutdown, restarting"),
            Err(e) if e.is_panic() => error!("[{label}] connector panicked, restarting: {e}"),
            Err(e) => error!("[{label}] connector task failed, restarting: {e}"),
        }

        tokio::select! {
            _ = tokio::time::sleep(restart_delay) => {}
            res = shutdown.changed() => {
                if res.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}
