//! Restart delay policy for connector sessions.
//!
//! Every session restart waits at least `initial`. Consecutive failed
//! sessions double the delay up to `max`, and a random jitter of up to
//! `jitter` × delay is added so that many connectors restarting together do
//! not hit an exchange in lockstep.
//!
//! Waiting goes through the [`Sleeper`] trait so tests can run the restart
//! loop without real timers.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

/// Exponential backoff with cap and proportional jitter.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    jitter: f64,
    current: Duration,
}

impl Backoff {
    /// `jitter` is clamped to `[0, 1]`; `initial` is raised to at least 1 ms.
    pub fn new(initial: Duration, max: Duration, jitter: f64) -> Self {
        let initial = initial.max(Duration::from_millis(1));
        Self { initial, max: max.max(initial), jitter: jitter.clamp(0.0, 1.0), current: initial }
    }

    /// Delay to wait before the next attempt. Advances the policy.
    pub fn next_delay(&mut self) -> Duration {
        let base = self.current;
        self.current = (self.current * 2).min(self.max);
        if self.jitter == 0.0 {
            return base;
        }
        let extra = base.mul_f64(rand::thread_rng().gen_range(0.0..=self.jitter));
        base + extra
    }

    /// Back to the minimum delay (called once a session streamed successfully).
    pub fn reset(&mut self) {
        self.current = self.initial;
    }

    pub fn initial(&self) -> Duration {
        self.initial
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(30), 0.2)
    }
}

/// Something that can wait for a duration.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real timer backed by `tokio::time::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Returns immediately and records every requested delay.
#[derive(Debug, Clone, Default)]
pub struct RecordingSleeper {
    delays: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays requested so far, in order.
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().map(|d| d.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        if let Ok(mut d) = self.delays.lock() {
            d.push(duration);
        }
        tokio::task::yield_now().await;
    }
}
