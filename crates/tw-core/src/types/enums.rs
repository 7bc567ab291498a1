//! Enumerations used throughout the ingestion system.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FeedError;

// ---------------------------------------------------------------------------
// Exchange identifiers
// ---------------------------------------------------------------------------

/// Supported cryptocurrency exchanges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Exchange {
    Binance,
    Kraken,
    Coinbase,
}

impl Exchange {
    /// All exchanges this build knows how to decode.
    pub const ALL: [Exchange; 3] = [Exchange::Binance, Exchange::Kraken, Exchange::Coinbase];

    /// Lowercase name, as used in store keys and config files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Binance => "binance",
            Self::Kraken => "kraken",
            Self::Coinbase => "coinbase",
        }
    }
}

impl std::fmt::Display for Exchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Exchange {
    type Err = FeedError;

    /// Case-insensitive parse. Unknown names are an unsupported exchange.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "binance" => Ok(Self::Binance),
            "kraken" => Ok(Self::Kraken),
            "coinbase" => Ok(Self::Coinbase),
            _ => Err(FeedError::UnsupportedExchange(s.to_string())),
        }
    }
}
