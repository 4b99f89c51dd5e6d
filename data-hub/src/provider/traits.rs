//! Provider trait definitions
//!
//! These traits define the interface for EOD data providers. Each provider
//! (Yahoo Finance, mock, ...) normalizes its payloads to the
//! `market-common` types before returning them.

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use market_common::{CorporateAction, DailyBar, ErrorCategory, ErrorClassification};

/// Provider error types
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ProviderError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Request error: {0}")]
    Request(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    #[error("Data not available: {0}")]
    DataNotAvailable(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ErrorClassification for ProviderError {
    fn category(&self) -> ErrorCategory {
        match self {
            ProviderError::Connection(_) => ErrorCategory::Transient,
            ProviderError::Request(_) => ErrorCategory::Transient,
            ProviderError::Parse(_) => ErrorCategory::Permanent,
            ProviderError::RateLimit(_) => ErrorCategory::ResourceExhausted,
            ProviderError::SymbolNotFound(_) => ErrorCategory::Permanent,
            ProviderError::DataNotAvailable(_) => ErrorCategory::Permanent,
            ProviderError::Timeout(_) => ErrorCategory::Transient,
            ProviderError::Configuration(_) => ErrorCategory::Configuration,
            ProviderError::Internal(_) => ErrorCategory::Internal,
        }
    }

    fn suggested_retry_delay(&self) -> Option<std::time::Duration> {
        match self {
            ProviderError::Connection(_) => Some(std::time::Duration::from_secs(2)),
            ProviderError::Request(_) => Some(std::time::Duration::from_millis(500)),
            ProviderError::RateLimit(_) => Some(std::time::Duration::from_secs(60)),
            ProviderError::Timeout(_) => Some(std::time::Duration::from_secs(2)),
            _ => None,
        }
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Source of daily bars and corporate-action events.
///
/// `fetch_daily_bars` may return fewer sessions than requested; callers
/// upsert what arrived and leave the rest for the next repair pass.
#[async_trait]
pub trait EodProvider: Send + Sync {
    /// Provider name (e.g. "yahoo", "mock")
    fn name(&self) -> &str;

    /// Fetch daily bars for `[start, end]`, ascending by session.
    async fn fetch_daily_bars(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ProviderResult<Vec<DailyBar>>;

    /// Fetch split/dividend events with ex-date on or after `since`,
    /// ascending by ex-date.
    async fn fetch_corporate_actions(
        &self,
        symbol: &str,
        since: NaiveDate,
    ) -> ProviderResult<Vec<CorporateAction>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_backs_off_a_minute() {
        let err = ProviderError::RateLimit("429".to_string());
        assert_eq!(err.category(), ErrorCategory::ResourceExhausted);
        assert_eq!(
            err.suggested_retry_delay(),
            Some(std::time::Duration::from_secs(60))
        );
        assert!(err.is_retryable());
    }

    #[test]
    fn test_parse_error_is_not_retryable() {
        let err = ProviderError::Parse("bad json".to_string());
        assert_eq!(err.category(), ErrorCategory::Permanent);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_timeout_is_transient() {
        assert!(ProviderError::Timeout(30).is_retryable());
    }
}
