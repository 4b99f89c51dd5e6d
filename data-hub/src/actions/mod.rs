//! Corporate-actions tracking
//!
//! Ingests split/dividend events from the provider and stores them once
//! per `(symbol, ex_date, action_type)` triple, regardless of how many
//! ingest runs see the same event. Adjustment of historical bars is a
//! downstream concern; this module only tracks the events and exposes the
//! unprocessed queue.

use chrono::NaiveDate;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;
use tracing::info;

use market_common::{ActionType, CorporateAction, ErrorCategory, ErrorClassification};

use crate::provider::{EodProvider, ProviderError};
use crate::storage::{CorporateActionStore, RepositoryError};

/// Corporate-actions errors
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ActionsError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Store(#[from] RepositoryError),
}

impl ErrorClassification for ActionsError {
    fn category(&self) -> ErrorCategory {
        match self {
            ActionsError::Provider(e) => e.category(),
            ActionsError::Store(e) => e.category(),
        }
    }

    fn suggested_retry_delay(&self) -> Option<Duration> {
        match self {
            ActionsError::Provider(e) => e.suggested_retry_delay(),
            ActionsError::Store(e) => e.suggested_retry_delay(),
        }
    }
}

/// Corporate-actions tracker
pub struct ActionTracker {
    provider: Arc<dyn EodProvider>,
    store: Arc<CorporateActionStore>,
    provider_timeout: Duration,
}

impl ActionTracker {
    /// Create a new tracker
    pub fn new(
        provider: Arc<dyn EodProvider>,
        store: Arc<CorporateActionStore>,
        provider_timeout: Duration,
    ) -> Self {
        Self {
            provider,
            store,
            provider_timeout,
        }
    }

    /// Fetch events since `since` and store the ones not seen before.
    ///
    /// Returns the number of newly stored events.
    pub async fn ingest_actions(
        &self,
        symbol: &str,
        since: NaiveDate,
    ) -> Result<usize, ActionsError> {
        let events = timeout(
            self.provider_timeout,
            self.provider.fetch_corporate_actions(symbol, since),
        )
        .await
        .map_err(|_| ProviderError::Timeout(self.provider_timeout.as_secs()))??;

        if events.is_empty() {
            return Ok(0);
        }

        let existing = self.store.existing_keys(symbol, since).await?;
        let fresh = filter_new(events, &existing);

        let mut stored = 0;
        for action in &fresh {
            self.store.insert(action).await?;
            stored += 1;
        }

        if stored > 0 {
            info!(symbol, %since, stored, "stored corporate actions");
        }
        Ok(stored)
    }

    /// Unprocessed events, ascending by ex-date, optionally for one symbol.
    pub async fn list_unprocessed(
        &self,
        symbol: Option<&str>,
    ) -> Result<Vec<CorporateAction>, ActionsError> {
        Ok(self.store.list_unprocessed(symbol).await?)
    }

    /// Hand-off for the adjustment consumer: flip an event to processed.
    pub async fn mark_processed(&self, id: i32) -> Result<bool, ActionsError> {
        Ok(self.store.mark_processed(id).await?)
    }
}

/// Drop events whose natural key is already stored, and de-duplicate
/// within the fetched batch itself.
fn filter_new(
    events: Vec<CorporateAction>,
    existing: &HashSet<(NaiveDate, ActionType)>,
) -> Vec<CorporateAction> {
    let mut seen = existing.clone();
    events
        .into_iter()
        .filter(|action| seen.insert(action.key()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_filter_new_drops_already_stored_keys() {
        let stored: HashSet<(NaiveDate, ActionType)> =
            [(date(2024, 2, 9), ActionType::Dividend)].into_iter().collect();

        let events = vec![
            CorporateAction::dividend("AAPL", date(2024, 2, 9), Decimal::new(24, 2)),
            CorporateAction::split("AAPL", date(2024, 6, 10), Decimal::from(4)),
        ];

        let fresh = filter_new(events, &stored);
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].action_type, ActionType::Split);
    }

    #[test]
    fn test_filter_new_deduplicates_within_batch() {
        let events = vec![
            CorporateAction::dividend("AAPL", date(2024, 2, 9), Decimal::new(24, 2)),
            CorporateAction::dividend("AAPL", date(2024, 2, 9), Decimal::new(24, 2)),
        ];

        let fresh = filter_new(events, &HashSet::new());
        assert_eq!(fresh.len(), 1);
    }

    #[test]
    fn test_same_date_different_type_both_kept() {
        let events = vec![
            CorporateAction::dividend("AAPL", date(2024, 2, 9), Decimal::new(24, 2)),
            CorporateAction::split("AAPL", date(2024, 2, 9), Decimal::from(2)),
        ];

        let fresh = filter_new(events, &HashSet::new());
        assert_eq!(fresh.len(), 2);
    }
}
