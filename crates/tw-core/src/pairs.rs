//! Bidirectional pair translation between canonical and exchange-native
//! spellings.
//!
//! The system names pairs canonically (`BTCUSD`), while each venue expects
//! its own symbol in subscriptions and echoes it back in trade messages
//! (`btcusd` on Binance, `BTC/USD` on Kraken, `BTC-USD` on Coinbase). A
//! [`PairTranslator`] holds one forward and one reverse map per exchange for
//! O(1) lookups in either direction.
//!
//! The translator is built once during wiring and shared read-only (via
//! `Arc`) by every connector and decoder. It has no interior mutability.
//!
//! A pair missing from an exchange's table is a *mapping-miss*: lookups
//! return `Ok(None)` and batch conversions drop the pair with a log line. The
//! only error is an exchange that has no table at all.

use std::collections::HashMap;

use ahash::AHashMap;
use tracing::{debug, info};

use crate::error::FeedError;
use crate::types::Exchange;

/// Raw mapping table as written in config: exchange name → canonical → native.
pub type PairMappingTable = HashMap<String, HashMap<String, String>>;

/// Forward and reverse maps for one exchange.
#[derive(Debug, Clone, Default)]
struct ExchangePairs {
    /// Canonical → native (e.g. `BTCUSD` → `BTC/USD`).
    to_native: AHashMap<String, String>,
    /// Native → canonical (e.g. `BTC/USD` → `BTCUSD`).
    to_canonical: AHashMap<String, String>,
}

/// Read-only pair translator shared by all connectors.
#[derive(Debug, Clone)]
pub struct PairTranslator {
    tables: AHashMap<Exchange, ExchangePairs>,
}

/// Pairs tracked out of the box, per exchange.
const DEFAULT_MAPPINGS: &[(Exchange, &[(&str, &str)])] = &[
    (
        Exchange::Binance,
        &[
            ("BTCUSD", "btcusd"),
            ("BTCUSDT", "btcusdt"),
            ("ETHUSD", "ethusd"),
            ("ETHUSDT", "ethusdt"),
            ("BNBBTC", "bnbbtc"),
            ("WBTCUSDT", "wbtcusdt"),
        ],
    ),
    (Exchange::Kraken, &[("BTCUSD", "BTC/USD"), ("ETHUSD", "ETH/USD")]),
    (Exchange::Coinbase, &[("BTCUSD", "BTC-USD"), ("ETHUSD", "ETH-USD")]),
];

impl PairTranslator {
    /// Build a translator from a config-style table.
    ///
    /// Fails if an exchange name is unknown or appears twice (names are
    /// case-insensitive), or if two canonical pairs map to the same native
    /// symbol on one exchange (the reverse lookup would be ambiguous).
    ///
    /// Binance symbols are case-insensitive on the wire and are stored lower
    /// case, the spelling used in stream names.
    pub fn new(table: &PairMappingTable) -> Result<Self, FeedError> {
        let mut tables = AHashMap::new();
        for (name, pairs) in table {
            let exchange: Exchange = name.parse()?;
            if tables.contains_key(&exchange) {
                return Err(FeedError::Config(format!("pair_mappings lists {exchange} more than once")));
            }
            let entries = pairs.iter().map(|(c, n)| (c.as_str(), n.as_str()));
            tables.insert(exchange, build_exchange_pairs(exchange, entries)?);
        }
        Ok(Self { tables })
    }

    /// Translator pre-loaded with the built-in table.
    pub fn with_defaults() -> Self {
        let mut tables = AHashMap::new();
        for (exchange, pairs) in DEFAULT_MAPPINGS {
            let mut ep = ExchangePairs::default();
            for (canonical, native) in pairs.iter() {
                ep.to_native.insert(canonical.to_string(), native.to_string());
                ep.to_canonical.insert(native.to_string(), canonical.to_string());
            }
            tables.insert(*exchange, ep);
        }
        Self { tables }
    }

    /// Convert a canonical pair to the exchange-native spelling.
    ///
    /// `Ok(None)` means no mapping is configured for this pair.
    pub fn to_exchange_format(&self, canonical: &str, exchange: Exchange) -> Result<Option<&str>, FeedError> {
        Ok(self.table(exchange)?.to_native.get(canonical).map(String::as_str))
    }

    /// Convert an exchange-native symbol back to the canonical pair.
    ///
    /// `Ok(None)` means the symbol is not one this system tracks.
    pub fn to_canonical_format(&self, native: &str, exchange: Exchange) -> Result<Option<&str>, FeedError> {
        Ok(self.table(exchange)?.to_canonical.get(native).map(String::as_str))
    }

    /// Convert a list of canonical pairs, dropping (and logging) any pair that
    /// has no mapping on this exchange.
    pub fn batch_to_exchange_format(&self, canonical: &[String], exchange: Exchange) -> Result<Vec<String>, FeedError> {
        let table = self.table(exchange)?;
        Ok(canonical
            .iter()
            .filter_map(|pair| match table.to_native.get(pair) {
                Some(native) => Some(native.clone()),
                None => {
                    info!("[pairs] missing pair mapping for {pair} on {exchange}, skipping");
                    None
                }
            })
            .collect())
    }

    /// Convert a list of exchange-native symbols back to canonical pairs,
    /// dropping unknown symbols.
    pub fn batch_to_canonical_format(&self, native: &[String], exchange: Exchange) -> Result<Vec<String>, FeedError> {
        let table = self.table(exchange)?;
        Ok(native
            .iter()
            .filter_map(|sym| match table.to_canonical.get(sym) {
                Some(canonical) => Some(canonical.clone()),
                None => {
                    debug!("[pairs] missing reverse mapping for {sym} on {exchange}, skipping");
                    None
                }
            })
            .collect())
    }

    /// Whether any table is configured for `exchange`.
    pub fn supports(&self, exchange: Exchange) -> bool {
        self.tables.contains_key(&exchange)
    }

    /// Number of canonical pairs mapped for `exchange` (0 if unsupported).
    pub fn len(&self, exchange: Exchange) -> usize {
        self.tables.get(&exchange).map(|t| t.to_native.len()).unwrap_or(0)
    }

    fn table(&self, exchange: Exchange) -> Result<&ExchangePairs, FeedError> {
        self.tables.get(&exchange).ok_or_else(|| FeedError::UnsupportedExchange(exchange.to_string()))
    }
}

impl Default for PairTranslator {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn build_exchange_pairs<'a>(
    exchange: Exchange,
    entries: impl Iterator<Item = (&'a str, &'a str)>,
) -> Result<ExchangePairs, FeedError> {
    let mut ep = ExchangePairs::default();
    for (canonical, native) in entries {
        let native = match exchange {
            Exchange::Binance => native.to_ascii_lowercase(),
            _ => native.to_string(),
        };
        if let Some(prev) = ep.to_canonical.insert(native.clone(), canonical.to_string()) {
            return Err(FeedError::Config(format!(
                "{exchange}: native symbol {native} mapped from both {prev} and {canonical}"
            )));
        }
        ep.to_native.insert(canonical.to_string(), native);
    }
    Ok(ep)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(entries: &[(&str, &[(&str, &str)])]) -> PairMappingTable {
        entries
            .iter()
            .map(|(ex, pairs)| {
                (ex.to_string(), pairs.iter().map(|(c, n)| (c.to_string(), n.to_string())).collect())
            })
            .collect()
    }

    #[test]
    fn defaults_translate_both_ways() {
        let t = PairTranslator::with_defaults();
        assert_eq!(t.to_exchange_format("BTCUSD", Exchange::Kraken).unwrap(), Some("BTC/USD"));
        assert_eq!(t.to_canonical_format("BTC-USD", Exchange::Coinbase).unwrap(), Some("BTCUSD"));
        assert_eq!(t.to_exchange_format("ETHUSDT", Exchange::Binance).unwrap(), Some("ethusdt"));
    }

    #[test]
    fn round_trip_is_identity_on_mapped_pairs() {
        let t = PairTranslator::with_defaults();
        for (exchange, pairs) in DEFAULT_MAPPINGS {
            for (canonical, _) in pairs.iter() {
                let native = t.to_exchange_format(canonical, *exchange).unwrap().unwrap();
                assert_eq!(t.to_canonical_format(native, *exchange).unwrap(), Some(*canonical));
            }
        }
    }

    #[test]
    fn missing_pair_is_not_an_error() {
        let t = PairTranslator::with_defaults();
        assert_eq!(t.to_exchange_format("XYZABC", Exchange::Kraken).unwrap(), None);
        assert_eq!(t.to_canonical_format("XYZ/ABC", Exchange::Kraken).unwrap(), None);
    }

    #[test]
    fn batch_drops_unmapped_pairs() {
        let t = PairTranslator::with_defaults();
        let pairs = vec!["BTCUSD".to_string(), "XYZABC".to_string()];
        assert_eq!(t.batch_to_exchange_format(&pairs, Exchange::Kraken).unwrap(), vec!["BTC/USD".to_string()]);

        let native = vec!["ETH-USD".to_string(), "DOGE-USD".to_string()];
        assert_eq!(t.batch_to_canonical_format(&native, Exchange::Coinbase).unwrap(), vec!["ETHUSD".to_string()]);
    }

    #[test]
    fn exchange_without_table_is_unsupported() {
        let t = PairTranslator::new(&table(&[("kraken", &[("BTCUSD", "BTC/USD")])])).unwrap();
        assert!(t.supports(Exchange::Kraken));
        assert!(!t.supports(Exchange::Binance));
        assert!(matches!(
            t.to_exchange_format("BTCUSD", Exchange::Binance),
            Err(FeedError::UnsupportedExchange(_))
        ));
        assert!(t.batch_to_exchange_format(&["BTCUSD".to_string()], Exchange::Coinbase).is_err());
    }

    #[test]
    fn unknown_exchange_name_in_table_is_rejected() {
        let err = PairTranslator::new(&table(&[("ftx", &[("BTCUSD", "BTC-PERP")])])).unwrap_err();
        assert!(matches!(err, FeedError::UnsupportedExchange(_)));
    }

    #[test]
    fn ambiguous_native_symbol_is_rejected() {
        let err = PairTranslator::new(&table(&[("coinbase", &[("BTCUSD", "BTC-USD"), ("XBTUSD", "BTC-USD")])]))
            .unwrap_err();
        assert!(matches!(err, FeedError::Config(_)));
    }

    #[test]
    fn exchange_listed_twice_is_rejected() {
        let err = PairTranslator::new(&table(&[
            ("kraken", &[("BTCUSD", "BTC/USD")]),
            ("Kraken", &[("ETHUSD", "ETH/USD")]),
        ]))
        .unwrap_err();
        assert!(matches!(err, FeedError::Config(_)));
    }

    #[test]
    fn binance_symbols_are_stored_lower_case() {
        let t = PairTranslator::new(&table(&[("binance", &[("BTCUSDT", "BTCUSDT")])])).unwrap();
        assert_eq!(t.to_exchange_format("BTCUSDT", Exchange::Binance).unwrap(), Some("btcusdt"));
        assert_eq!(t.to_canonical_format("btcusdt", Exchange::Binance).unwrap(), Some("BTCUSDT"));

        // Only Binance is folded; Kraken symbols keep their spelling.
        let t = PairTranslator::new(&table(&[("kraken", &[("BTCUSD", "BTC/USD")])])).unwrap();
        assert_eq!(t.to_canonical_format("btc/usd", Exchange::Kraken).unwrap(), None);

        let err = PairTranslator::new(&table(&[("binance", &[("BTCUSDT", "BTCUSDT"), ("XBTUSDT", "btcusdt")])]))
            .unwrap_err();
        assert!(matches!(err, FeedError::Config(_)));
    }
}
