//! Typed error definitions for the tradewire ingestion system.
//!
//! Provides [`FeedError`] for domain-specific errors that are more informative
//! than plain `anyhow::Error` strings. All variants implement `std::error::Error`
//! via `thiserror`, so they integrate seamlessly with `anyhow::Result`.
//!
//! Only [`FeedError::Config`] and [`FeedError::UnsupportedExchange`] are meant
//! to cross a connector boundary; everything else is contained per session or
//! per message.

use thiserror::Error;

use crate::types::Exchange;

/// Domain-specific errors for the tradewire system.
#[derive(Debug, Error)]
pub enum FeedError {
    /// Configuration parsing or validation error.
    #[error("config error: {0}")]
    Config(String),

    /// The exchange has no pair mapping table at all.
    #[error("exchange {0} not supported")]
    UnsupportedExchange(String),

    /// WebSocket dial, handshake, or communication error.
    #[error("websocket error: {0}")]
    WebSocket(String),

    /// History store read or write failure.
    #[error("store error: {0}")]
    Store(String),

    /// A decoded trade violated the canonical trade invariants.
    #[error("invalid trade from {exchange}: {reason}")]
    InvalidTrade { exchange: Exchange, reason: String },
}

impl From<redis::RedisError> for FeedError {
    fn from(e: redis::RedisError) -> Self {
        Self::Store(e.to_string())
    }
}
