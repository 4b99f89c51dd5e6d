//! Mock data provider for testing
//!
//! Generates deterministic daily bars over the trading calendar, with
//! knobs for omitted sessions (partial responses) and per-symbol failures,
//! so gap-repair and batch-isolation behavior can be exercised without a
//! network.

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::HashSet;

use market_common::{calendar, CorporateAction, DailyBar};

use crate::provider::{EodProvider, ProviderError, ProviderResult};

/// Mock EOD provider
pub struct MockProvider {
    /// Close price of the first generated session
    pub base_price: Decimal,
    /// Per-session price increment
    pub drift: Decimal,
    /// Volume reported for every bar
    pub volume: i64,
    /// Sessions the provider pretends to have no data for
    omitted: HashSet<NaiveDate>,
    /// Symbols whose fetches fail with a connection error
    failing: HashSet<String>,
    /// Canned corporate actions, returned filtered by symbol and date
    actions: Vec<CorporateAction>,
}

impl MockProvider {
    /// Create a new mock provider
    pub fn new() -> Self {
        Self {
            base_price: Decimal::from(100),
            drift: Decimal::ONE,
            volume: 1_000_000,
            omitted: HashSet::new(),
            failing: HashSet::new(),
            actions: Vec::new(),
        }
    }

    /// Omit the given sessions from every response (simulates partial data)
    pub fn with_omitted_sessions(mut self, sessions: impl IntoIterator<Item = NaiveDate>) -> Self {
        self.omitted.extend(sessions);
        self
    }

    /// Make fetches for the given symbol fail
    pub fn with_failing_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.failing.insert(symbol.into());
        self
    }

    /// Add canned corporate actions
    pub fn with_actions(mut self, actions: Vec<CorporateAction>) -> Self {
        self.actions.extend(actions);
        self
    }

    fn generate_bars(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Vec<DailyBar> {
        calendar::expected_sessions(start, end)
            .into_iter()
            .filter(|session| !self.omitted.contains(session))
            .enumerate()
            .map(|(i, session)| {
                let close = self.base_price + self.drift * Decimal::from(i as i64);
                let open = close - self.drift / Decimal::TWO;
                let high = close + Decimal::ONE;
                let low = open - Decimal::ONE;
                DailyBar::new(symbol, session, open, high, low, close, self.volume)
            })
            .collect()
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EodProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch_daily_bars(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ProviderResult<Vec<DailyBar>> {
        if self.failing.contains(symbol) {
            return Err(ProviderError::Connection(format!(
                "mock failure for {}",
                symbol
            )));
        }

        Ok(self.generate_bars(symbol, start, end))
    }

    async fn fetch_corporate_actions(
        &self,
        symbol: &str,
        since: NaiveDate,
    ) -> ProviderResult<Vec<CorporateAction>> {
        if self.failing.contains(symbol) {
            return Err(ProviderError::Connection(format!(
                "mock failure for {}",
                symbol
            )));
        }

        let mut actions: Vec<CorporateAction> = self
            .actions
            .iter()
            .filter(|action| action.symbol == symbol && action.ex_date >= since)
            .cloned()
            .collect();
        actions.sort_by_key(|action| action.ex_date);
        Ok(actions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use market_common::ActionType;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_generates_one_bar_per_business_day() {
        let provider = MockProvider::new();
        // Mon 2024-03-04 through Fri 2024-03-08 plus a weekend
        let bars = provider
            .fetch_daily_bars("TEST", date(2024, 3, 4), date(2024, 3, 10))
            .await
            .unwrap();
        assert_eq!(bars.len(), 5);
        assert!(bars.iter().all(|bar| bar.validate().is_ok()));
    }

    #[tokio::test]
    async fn test_omitted_sessions_are_missing() {
        let provider = MockProvider::new().with_omitted_sessions([date(2024, 3, 6)]);
        let bars = provider
            .fetch_daily_bars("TEST", date(2024, 3, 4), date(2024, 3, 8))
            .await
            .unwrap();
        assert_eq!(bars.len(), 4);
        assert!(bars.iter().all(|bar| bar.session != date(2024, 3, 6)));
    }

    #[tokio::test]
    async fn test_failing_symbol_errors() {
        let provider = MockProvider::new().with_failing_symbol("BROKEN");
        let result = provider
            .fetch_daily_bars("BROKEN", date(2024, 3, 4), date(2024, 3, 8))
            .await;
        assert!(matches!(result, Err(ProviderError::Connection(_))));

        // Other symbols are unaffected
        assert!(provider
            .fetch_daily_bars("OK", date(2024, 3, 4), date(2024, 3, 8))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_actions_filtered_by_symbol_and_date() {
        let provider = MockProvider::new().with_actions(vec![
            CorporateAction::dividend("AAPL", date(2024, 2, 9), Decimal::new(24, 2)),
            CorporateAction::split("AAPL", date(2024, 6, 10), Decimal::from(4)),
            CorporateAction::dividend("MSFT", date(2024, 5, 15), Decimal::new(75, 2)),
        ]);

        let actions = provider
            .fetch_corporate_actions("AAPL", date(2024, 3, 1))
            .await
            .unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].action_type, ActionType::Split);
    }
}
