//! # tw-core
//!
//! Core crate for the tradewire ingestion system, providing:
//!
//! - **Types** (`types`): `Exchange` and the canonical `Trade` record
//! - **Configuration** (`config`): JSON config deserialization
//! - **Error types** (`error`): domain-specific `FeedError` via thiserror
//! - **Pair translation** (`pairs`): canonical ↔ exchange-native symbols
//! - **History store** (`history`): bounded per-pair trade lists (Redis / memory)
//! - **Backoff** (`backoff`): session restart delays with an injectable sleeper
//! - **Time utilities** (`time_util`): timestamp normalization to epoch ms
//! - **Logging** (`logging`): tracing-based structured logging

pub mod backoff;
pub mod config;
pub mod error;
pub mod history;
pub mod logging;
pub mod pairs;
pub mod time_util;
pub mod types;

// Re-export types at crate root for convenience.
pub use types::*;
