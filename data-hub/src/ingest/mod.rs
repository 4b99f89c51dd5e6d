//! Bar ingestion
//!
//! One code path from provider to store: fetch a range of daily bars,
//! upsert them idempotently. Scheduled ingestion and gap repair both go
//! through here, parameterized only by range, so repaired rows are written
//! exactly like fresh ones.

use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{info, warn};

use market_common::{ErrorCategory, ErrorClassification};

use crate::provider::{EodProvider, ProviderError};
use crate::storage::{BarRepository, RepositoryError};

/// Ingestion errors
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum IngestError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Store(#[from] RepositoryError),
}

impl ErrorClassification for IngestError {
    fn category(&self) -> ErrorCategory {
        match self {
            IngestError::Provider(e) => e.category(),
            IngestError::Store(e) => e.category(),
        }
    }

    fn suggested_retry_delay(&self) -> Option<Duration> {
        match self {
            IngestError::Provider(e) => e.suggested_retry_delay(),
            IngestError::Store(e) => e.suggested_retry_delay(),
        }
    }
}

/// Outcome of one ingestion pass over a symbol and range
#[derive(Debug, Clone, Copy, Default)]
pub struct IngestReport {
    /// Bars the provider returned
    pub fetched: usize,
    /// Bars written (inserted or overwritten)
    pub written: usize,
    /// Bars rejected by validation
    pub rejected: usize,
}

/// Fetch-and-store service for daily bars
pub struct IngestService {
    provider: Arc<dyn EodProvider>,
    bars: Arc<BarRepository>,
    provider_timeout: Duration,
    atomic_batch: bool,
}

impl IngestService {
    /// Create a new ingest service
    pub fn new(
        provider: Arc<dyn EodProvider>,
        bars: Arc<BarRepository>,
        provider_timeout: Duration,
        atomic_batch: bool,
    ) -> Self {
        Self {
            provider,
            bars,
            provider_timeout,
            atomic_batch,
        }
    }

    /// Fetch bars for `[start, end]` and upsert them.
    ///
    /// A provider that returns fewer sessions than requested is not an
    /// error: what arrived is stored, the rest stays missing for the next
    /// repair pass. Provider calls are bounded by the configured timeout.
    pub async fn ingest_range(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<IngestReport, IngestError> {
        let bars = timeout(
            self.provider_timeout,
            self.provider.fetch_daily_bars(symbol, start, end),
        )
        .await
        .map_err(|_| ProviderError::Timeout(self.provider_timeout.as_secs()))??;

        if bars.is_empty() {
            info!(symbol, %start, %end, "provider returned no bars");
            return Ok(IngestReport::default());
        }

        let fetched = bars.len();
        let report = if self.atomic_batch {
            let written = self.bars.upsert_bars_atomic(symbol, &bars).await?;
            IngestReport {
                fetched,
                written,
                rejected: 0,
            }
        } else {
            let upsert = self.bars.upsert_bars(symbol, &bars).await?;
            if !upsert.rejected.is_empty() {
                warn!(
                    symbol,
                    rejected = upsert.rejected.len(),
                    "batch continued past invalid bars"
                );
            }
            IngestReport {
                fetched,
                written: upsert.written,
                rejected: upsert.rejected.len(),
            }
        };

        info!(
            symbol,
            %start,
            %end,
            fetched = report.fetched,
            written = report.written,
            rejected = report.rejected,
            "ingested bars"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingest_error_classification_delegates() {
        let provider_err: IngestError = ProviderError::RateLimit("quota".to_string()).into();
        assert_eq!(provider_err.category(), ErrorCategory::ResourceExhausted);
        assert!(provider_err.is_retryable());

        let store_err: IngestError = RepositoryError::Database(sqlx::Error::PoolTimedOut).into();
        assert_eq!(store_err.category(), ErrorCategory::Transient);
    }
}
