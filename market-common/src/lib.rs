//! # Market Common
//!
//! Shared domain layer for the EOD data hub: bar, corporate-action, and
//! quality-finding types, OHLCV validation, the trading-session calendar,
//! and session-gap detection. Everything here is database-free so the
//! algorithms can be tested without infrastructure.

pub mod calendar;
pub mod data;
pub mod error;
pub mod gaps;

pub use data::{
    ActionType, BarValidationError, CheckType, CorporateAction, DailyBar, QualityFinding, Severity,
};
pub use error::{ErrorCategory, ErrorClassification};
pub use gaps::SessionRun;
