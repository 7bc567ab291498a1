//! # tw-md
//!
//! Exchange trade feeds for the tradewire ingestion system.
//!
//! ## Architecture
//!
//! Each exchange module provides a `build(ws_url, pairs, translator) -> FeedDef`
//! function that describes its WebSocket stream and owns a [`normalizer::TradeDecoder`]
//! for its wire format. The generic [`connector::ExchangeConnector`] runs any
//! feed through the session state machine, and the [`supervisor`] keeps one
//! connector alive per configured exchange.
//!
//! ## Shared infrastructure
//!
//! - [`feed`]: `FeedDef` descriptor
//! - [`registry`]: config entry to `FeedDef`
//! - [`normalizer`]: decoder trait and outcome types
//! - [`json_util`]: JSON number and timestamp helpers

pub mod binance;
pub mod coinbase;
pub mod connector;
pub mod feed;
pub mod json_util;
pub mod kraken;
pub mod normalizer;
pub mod registry;
pub mod supervisor;
