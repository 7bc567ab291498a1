//! The canonical trade record written to the history store.
//!
//! # Timestamp convention
//!
//! All timestamps are in **milliseconds since Unix epoch**, whatever unit the
//! exchange used on the wire.
//!
//! # Serialized shape
//!
//! Stored entries use PascalCase field names (`{"Exchange":"kraken","Pair":
//! "BTCUSD","Price":65000.5,...}`), the shape the query layer reads back.

use serde::{Deserialize, Serialize};

use super::enums::Exchange;
use crate::error::FeedError;

/// A single normalized trade execution.
///
/// Constructed only through [`Trade::new`], which enforces `price > 0` and
/// `quantity >= 0`. Fields are read-only after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", try_from = "StoredTrade")]
pub struct Trade {
    exchange: Exchange,
    pair: String,
    price: f64,
    quantity: f64,
    timestamp: i64,
    is_buyer_maker: bool,
}

/// Wire shape of a stored entry; converted through [`Trade::new`] so that
/// entries read back from the store obey the same invariants.
#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StoredTrade {
    exchange: Exchange,
    pair: String,
    price: f64,
    quantity: f64,
    timestamp: i64,
    is_buyer_maker: bool,
}

impl TryFrom<StoredTrade> for Trade {
    type Error = FeedError;

    fn try_from(raw: StoredTrade) -> Result<Self, Self::Error> {
        Trade::new(raw.exchange, raw.pair, raw.price, raw.quantity, raw.timestamp, raw.is_buyer_maker)
    }
}

impl Trade {
    /// Build a validated trade.
    ///
    /// `pair` must already be the canonical spelling. Non-finite or
    /// non-positive prices and negative quantities are rejected.
    pub fn new(
        exchange: Exchange,
        pair: impl Into<String>,
        price: f64,
        quantity: f64,
        timestamp_ms: i64,
        is_buyer_maker: bool,
    ) -> Result<Self, FeedError> {
        if !price.is_finite() || price <= 0.0 {
            return Err(FeedError::InvalidTrade { exchange, reason: format!("price {price} is not positive") });
        }
        if !quantity.is_finite() || quantity < 0.0 {
            return Err(FeedError::InvalidTrade { exchange, reason: format!("quantity {quantity} is negative") });
        }
        Ok(Self { exchange, pair: pair.into(), price, quantity, timestamp: timestamp_ms, is_buyer_maker })
    }

    pub fn exchange(&self) -> Exchange {
        self.exchange
    }

    /// Canonical pair, e.g. `BTCUSD`.
    pub fn pair(&self) -> &str {
        &self.pair
    }

    pub fn price(&self) -> f64 {
        self.price
    }

    pub fn quantity(&self) -> f64 {
        self.quantity
    }

    /// Epoch milliseconds.
    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp
    }

    /// `true` when the maker side of the trade was the buyer.
    pub fn is_buyer_maker(&self) -> bool {
        self.is_buyer_maker
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_positive_price() {
        assert!(Trade::new(Exchange::Kraken, "BTCUSD", 0.0, 1.0, 0, false).is_err());
        assert!(Trade::new(Exchange::Kraken, "BTCUSD", -1.0, 1.0, 0, false).is_err());
        assert!(Trade::new(Exchange::Kraken, "BTCUSD", f64::NAN, 1.0, 0, false).is_err());
    }

    #[test]
    fn zero_quantity_is_allowed() {
        let trade = Trade::new(Exchange::Binance, "BTCUSDT", 1.0, 0.0, 5, true).unwrap();
        assert_eq!(trade.quantity(), 0.0);
        assert!(Trade::new(Exchange::Binance, "BTCUSDT", 1.0, -0.5, 5, true).is_err());
    }

    #[test]
    fn serializes_with_pascal_case_fields() {
        let trade = Trade::new(Exchange::Kraken, "BTCUSD", 65000.5, 0.01, 1_700_000_000_000, true).unwrap();
        let json = serde_json::to_value(&trade).unwrap();
        assert_eq!(json["Exchange"], "kraken");
        assert_eq!(json["Pair"], "BTCUSD");
        assert_eq!(json["Price"], 65000.5);
        assert_eq!(json["Timestamp"], 1_700_000_000_000i64);
        assert_eq!(json["IsBuyerMaker"], true);

        let back: Trade = serde_json::from_value(json).unwrap();
        assert_eq!(back, trade);
    }

    #[test]
    fn deserializing_enforces_invariants() {
        let zero_price = r#"{"Exchange":"kraken","Pair":"BTCUSD","Price":0,"Quantity":1,"Timestamp":1,"IsBuyerMaker":false}"#;
        assert!(serde_json::from_str::<Trade>(zero_price).is_err());
        let negative_qty = r#"{"Exchange":"kraken","Pair":"BTCUSD","Price":1,"Quantity":-1,"Timestamp":1,"IsBuyerMaker":false}"#;
        assert!(serde_json::from_str::<Trade>(negative_qty).is_err());
    }
}
