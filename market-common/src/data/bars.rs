//! Daily OHLCV bar type and write-time validation

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation failures for a single bar.
///
/// The storage layer rejects the offending row and keeps going; these
/// variants carry enough context to log the rejection usefully.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum BarValidationError {
    #[error("{field} must be positive, got {value}")]
    NonPositivePrice { field: &'static str, value: Decimal },

    #[error("volume must be non-negative, got {volume}")]
    NegativeVolume { volume: i64 },

    #[error("high {high} is below {field} {value}")]
    HighNotHighest {
        high: Decimal,
        field: &'static str,
        value: Decimal,
    },

    #[error("low {low} is above {field} {value}")]
    LowNotLowest {
        low: Decimal,
        field: &'static str,
        value: Decimal,
    },

    #[error("symbol cannot be empty")]
    EmptySymbol,
}

/// One trading session's OHLCV for a symbol.
///
/// Identity is the `(symbol, session)` pair; there is no surrogate id
/// because the bar store is partitioned by session date and that pair is
/// the only stable key for a session's bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBar {
    pub symbol: String,
    /// Trading-session date
    pub session: NaiveDate,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: i64,
    /// Close adjusted for splits/dividends, when the provider supplies it
    pub adjusted_close: Option<Decimal>,
    pub split_adjusted: bool,
    pub dividend_adjusted: bool,
}

impl DailyBar {
    /// Create an unadjusted bar.
    pub fn new(
        symbol: impl Into<String>,
        session: NaiveDate,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: i64,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            session,
            open,
            high,
            low,
            close,
            volume,
            adjusted_close: None,
            split_adjusted: false,
            dividend_adjusted: false,
        }
    }

    /// Set the adjusted close.
    pub fn with_adjusted_close(mut self, adjusted_close: Decimal) -> Self {
        self.adjusted_close = Some(adjusted_close);
        self
    }

    /// Check the OHLCV invariants enforced at write time.
    ///
    /// Invariants: all prices positive, volume non-negative,
    /// `high >= max(open, close, low)` and `low <= min(open, close, high)`.
    pub fn validate(&self) -> Result<(), BarValidationError> {
        if self.symbol.is_empty() {
            return Err(BarValidationError::EmptySymbol);
        }

        for (field, value) in [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
        ] {
            if value <= Decimal::ZERO {
                return Err(BarValidationError::NonPositivePrice { field, value });
            }
        }

        if self.volume < 0 {
            return Err(BarValidationError::NegativeVolume {
                volume: self.volume,
            });
        }

        for (field, value) in [("open", self.open), ("close", self.close), ("low", self.low)] {
            if self.high < value {
                return Err(BarValidationError::HighNotHighest {
                    high: self.high,
                    field,
                    value,
                });
            }
        }

        for (field, value) in [("open", self.open), ("close", self.close), ("high", self.high)] {
            if self.low > value {
                return Err(BarValidationError::LowNotLowest {
                    low: self.low,
                    field,
                    value,
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(open: i64, high: i64, low: i64, close: i64) -> DailyBar {
        DailyBar::new(
            "AAPL",
            NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
            Decimal::from(open),
            Decimal::from(high),
            Decimal::from(low),
            Decimal::from(close),
            1_000,
        )
    }

    #[test]
    fn test_valid_bar_passes() {
        assert!(bar(100, 105, 98, 103).validate().is_ok());
    }

    #[test]
    fn test_flat_bar_passes() {
        // open == high == low == close is a legal (if dull) session
        assert!(bar(100, 100, 100, 100).validate().is_ok());
    }

    #[test]
    fn test_high_below_low_rejected() {
        let err = bar(100, 95, 98, 96).validate().unwrap_err();
        assert!(matches!(err, BarValidationError::HighNotHighest { .. }));
    }

    #[test]
    fn test_low_above_close_rejected() {
        let err = bar(100, 105, 101, 100).validate().unwrap_err();
        assert!(matches!(err, BarValidationError::LowNotLowest { .. }));
    }

    #[test]
    fn test_zero_price_rejected() {
        let mut b = bar(100, 105, 98, 103);
        b.close = Decimal::ZERO;
        let err = b.validate().unwrap_err();
        assert!(matches!(
            err,
            BarValidationError::NonPositivePrice { field: "close", .. }
        ));
    }

    #[test]
    fn test_negative_volume_rejected() {
        let mut b = bar(100, 105, 98, 103);
        b.volume = -1;
        assert!(matches!(
            b.validate().unwrap_err(),
            BarValidationError::NegativeVolume { volume: -1 }
        ));
    }

    #[test]
    fn test_zero_volume_allowed() {
        let mut b = bar(100, 105, 98, 103);
        b.volume = 0;
        assert!(b.validate().is_ok());
    }
}
