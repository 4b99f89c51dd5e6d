//! Corporate action (split/dividend) records

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Kind of corporate action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionType {
    Split,
    Dividend,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Split => "split",
            ActionType::Dividend => "dividend",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "split" => Some(ActionType::Split),
            "dividend" => Some(ActionType::Dividend),
            _ => None,
        }
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A split or dividend event for a symbol.
///
/// Storage assigns a surrogate id, but the natural key is
/// `(symbol, ex_date, action_type)` and the tracker de-duplicates on that
/// triple so re-ingesting the same window never stores an event twice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorporateAction {
    /// Surrogate id, absent until stored
    pub id: Option<i32>,
    pub symbol: String,
    pub action_type: ActionType,
    pub ex_date: NaiveDate,
    /// e.g. 2.0 for a 2-for-1 split
    pub split_ratio: Option<Decimal>,
    /// Dividend amount per share
    pub dividend_amount: Option<Decimal>,
    pub processed: bool,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
}

impl CorporateAction {
    /// Create an unstored split event.
    pub fn split(symbol: impl Into<String>, ex_date: NaiveDate, ratio: Decimal) -> Self {
        Self {
            id: None,
            symbol: symbol.into(),
            action_type: ActionType::Split,
            ex_date,
            split_ratio: Some(ratio),
            dividend_amount: None,
            processed: false,
            processed_at: None,
            created_at: None,
        }
    }

    /// Create an unstored dividend event.
    pub fn dividend(symbol: impl Into<String>, ex_date: NaiveDate, amount: Decimal) -> Self {
        Self {
            id: None,
            symbol: symbol.into(),
            action_type: ActionType::Dividend,
            ex_date,
            split_ratio: None,
            dividend_amount: Some(amount),
            processed: false,
            processed_at: None,
            created_at: None,
        }
    }

    /// Natural de-duplication key within one symbol.
    pub fn key(&self) -> (NaiveDate, ActionType) {
        (self.ex_date, self.action_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_type_round_trip() {
        assert_eq!(ActionType::Split.as_str(), "split");
        assert_eq!(ActionType::from_str("dividend"), Some(ActionType::Dividend));
        assert_eq!(ActionType::from_str("merger"), None);
    }

    #[test]
    fn test_key_distinguishes_type_on_same_date() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 10).unwrap();
        let split = CorporateAction::split("AAPL", date, Decimal::from(4));
        let div = CorporateAction::dividend("AAPL", date, Decimal::new(24, 2));
        assert_ne!(split.key(), div.key());
    }
}
