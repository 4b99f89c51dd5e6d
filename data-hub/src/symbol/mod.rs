//! Symbol universe management
//!
//! The authoritative mapping of tracked symbols to metadata and
//! active/inactive status. Symbols are soft-lifecycle only: operators
//! toggle `is_active`, nothing is ever hard-deleted.

mod registry;

pub use registry::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Asset classification for a tracked symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetType {
    Equity,
    Etf,
    Index,
    Fund,
}

impl AssetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetType::Equity => "equity",
            AssetType::Etf => "etf",
            AssetType::Index => "index",
            AssetType::Fund => "fund",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "equity" => Some(AssetType::Equity),
            "etf" => Some(AssetType::Etf),
            "index" => Some(AssetType::Index),
            "fund" => Some(AssetType::Fund),
            _ => None,
        }
    }
}

impl std::fmt::Display for AssetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A symbol registered in the universe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedSymbol {
    pub id: i32,
    pub symbol: String,
    pub name: Option<String>,
    pub exchange: Option<String>,
    pub asset_type: AssetType,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub is_active: bool,
    pub data_source: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Metadata for registering a symbol
#[derive(Debug, Clone, PartialEq)]
pub struct NewSymbol {
    pub symbol: String,
    pub name: Option<String>,
    pub exchange: Option<String>,
    pub asset_type: AssetType,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub data_source: String,
}

impl NewSymbol {
    /// Create a minimal equity registration for the default data source.
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            name: None,
            exchange: None,
            asset_type: AssetType::Equity,
            sector: None,
            industry: None,
            data_source: "yahoo".to_string(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_exchange(mut self, exchange: impl Into<String>) -> Self {
        self.exchange = Some(exchange.into());
        self
    }

    pub fn with_asset_type(mut self, asset_type: AssetType) -> Self {
        self.asset_type = asset_type;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_type_round_trip() {
        for asset in [AssetType::Equity, AssetType::Etf, AssetType::Index, AssetType::Fund] {
            assert_eq!(AssetType::from_str(asset.as_str()), Some(asset));
        }
        assert_eq!(AssetType::from_str("bond"), None);
    }

    #[test]
    fn test_new_symbol_builder() {
        let new = NewSymbol::new("SPY")
            .with_name("SPDR S&P 500")
            .with_exchange("NYSEARCA")
            .with_asset_type(AssetType::Etf);
        assert_eq!(new.symbol, "SPY");
        assert_eq!(new.asset_type, AssetType::Etf);
        assert_eq!(new.data_source, "yahoo");
    }
}
