//! Yahoo Finance EOD data provider
//!
//! Fetches daily bars and split/dividend events from the v8 chart API.
//! Responses are normalized to `market-common` types; sessions with null
//! fields are dropped rather than guessed at. Requests are rate-limited
//! client-side to stay under the unauthenticated quota.

mod types;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use rust_decimal::Decimal;
use std::num::NonZeroU32;
use tracing::{debug, warn};

use market_common::{CorporateAction, DailyBar};

use crate::config::YahooSettings;
use crate::provider::{EodProvider, ProviderError, ProviderResult};

use types::ChartResponse;

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Yahoo Finance provider
pub struct YahooProvider {
    http: reqwest::Client,
    base_url: String,
    limiter: DirectLimiter,
    timeout_secs: u64,
}

impl YahooProvider {
    /// Create a provider from settings
    pub fn new(settings: &YahooSettings, timeout_secs: u64) -> ProviderResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .user_agent(settings.user_agent.clone())
            .build()
            .map_err(|e| ProviderError::Configuration(e.to_string()))?;

        let per_minute =
            NonZeroU32::new(settings.requests_per_minute).unwrap_or(NonZeroU32::MIN);
        let limiter = RateLimiter::direct(Quota::per_minute(per_minute));

        Ok(Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            limiter,
            timeout_secs,
        })
    }

    async fn fetch_chart(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
        events: Option<&str>,
    ) -> ProviderResult<String> {
        self.limiter.until_ready().await;

        let url = format!("{}/v8/finance/chart/{}", self.base_url, symbol);
        // period2 is an exclusive instant; push it past the end session
        let period1 = unix_midnight(start);
        let period2 = unix_midnight(end + Duration::days(1));

        let mut query: Vec<(&str, String)> = vec![
            ("period1", period1.to_string()),
            ("period2", period2.to_string()),
            ("interval", "1d".to_string()),
        ];
        if let Some(events) = events {
            query.push(("events", events.to_string()));
        }

        let response = self
            .http
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(self.timeout_secs)
                } else if e.is_connect() {
                    ProviderError::Connection(e.to_string())
                } else {
                    ProviderError::Request(e.to_string())
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimit(format!("{} for {}", status, symbol)));
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ProviderError::SymbolNotFound(symbol.to_string()));
        }
        if !status.is_success() {
            return Err(ProviderError::Request(format!(
                "unexpected status {} for {}",
                status, symbol
            )));
        }

        response
            .text()
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))
    }
}

#[async_trait]
impl EodProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo"
    }

    async fn fetch_daily_bars(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ProviderResult<Vec<DailyBar>> {
        let body = self.fetch_chart(symbol, start, end, None).await?;
        let bars = parse_daily_bars(symbol, &body, start, end)?;
        debug!(symbol, %start, %end, count = bars.len(), "fetched daily bars");
        Ok(bars)
    }

    async fn fetch_corporate_actions(
        &self,
        symbol: &str,
        since: NaiveDate,
    ) -> ProviderResult<Vec<CorporateAction>> {
        let today = chrono::Utc::now().date_naive();
        let body = self
            .fetch_chart(symbol, since, today, Some("div,split"))
            .await?;
        let actions = parse_corporate_actions(symbol, &body, since)?;
        debug!(symbol, %since, count = actions.len(), "fetched corporate actions");
        Ok(actions)
    }
}

fn unix_midnight(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp()
}

fn session_of(unix_ts: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp(unix_ts, 0).map(|dt| dt.date_naive())
}

fn decimal_of(value: f64, field: &str) -> ProviderResult<Decimal> {
    Decimal::try_from(value)
        .map_err(|e| ProviderError::Parse(format!("bad {} value {}: {}", field, value, e)))
}

fn chart_result(symbol: &str, body: &str) -> ProviderResult<types::ChartResult> {
    let response: ChartResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::Parse(format!("chart payload for {}: {}", symbol, e)))?;

    if let Some(error) = response.chart.error {
        if error.code.eq_ignore_ascii_case("not found") {
            return Err(ProviderError::SymbolNotFound(format!(
                "{}: {}",
                symbol, error.description
            )));
        }
        return Err(ProviderError::DataNotAvailable(format!(
            "{}: {} ({})",
            symbol, error.description, error.code
        )));
    }

    response
        .chart
        .result
        .and_then(|mut results| {
            if results.is_empty() {
                None
            } else {
                Some(results.remove(0))
            }
        })
        .ok_or_else(|| ProviderError::DataNotAvailable(format!("empty chart result for {}", symbol)))
}

/// Parse a chart payload into bars for `[start, end]`.
///
/// Sessions where any OHLCV field is null are dropped; a partial response
/// is not an error.
fn parse_daily_bars(
    symbol: &str,
    body: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> ProviderResult<Vec<DailyBar>> {
    let result = chart_result(symbol, body)?;

    let timestamps = match result.timestamp {
        Some(ts) if !ts.is_empty() => ts,
        _ => return Ok(Vec::new()),
    };

    let quote = result
        .indicators
        .quote
        .first()
        .ok_or_else(|| ProviderError::Parse(format!("missing quote block for {}", symbol)))?;
    let adjclose = result
        .indicators
        .adjclose
        .as_ref()
        .and_then(|blocks| blocks.first());

    let mut bars = Vec::with_capacity(timestamps.len());
    let mut dropped = 0usize;

    for (i, &ts) in timestamps.iter().enumerate() {
        let Some(session) = session_of(ts) else {
            dropped += 1;
            continue;
        };
        if session < start || session > end {
            continue;
        }

        let fields = (
            quote.open.get(i).copied().flatten(),
            quote.high.get(i).copied().flatten(),
            quote.low.get(i).copied().flatten(),
            quote.close.get(i).copied().flatten(),
            quote.volume.get(i).copied().flatten(),
        );
        let (Some(open), Some(high), Some(low), Some(close), Some(volume)) = fields else {
            dropped += 1;
            continue;
        };

        let mut bar = DailyBar::new(
            symbol,
            session,
            decimal_of(open, "open")?,
            decimal_of(high, "high")?,
            decimal_of(low, "low")?,
            decimal_of(close, "close")?,
            volume,
        );
        if let Some(adj) = adjclose.and_then(|block| block.adjclose.get(i).copied().flatten()) {
            bar = bar.with_adjusted_close(decimal_of(adj, "adjclose")?);
        }
        bars.push(bar);
    }

    if dropped > 0 {
        warn!(symbol, dropped, "dropped sessions with null fields");
    }

    bars.sort_by_key(|bar| bar.session);
    Ok(bars)
}

/// Parse split/dividend events with ex-date on or after `since`.
fn parse_corporate_actions(
    symbol: &str,
    body: &str,
    since: NaiveDate,
) -> ProviderResult<Vec<CorporateAction>> {
    let result = chart_result(symbol, body)?;

    let Some(events) = result.events else {
        return Ok(Vec::new());
    };

    let mut actions = Vec::new();

    if let Some(dividends) = events.dividends {
        for event in dividends.into_values() {
            let Some(ex_date) = session_of(event.date) else {
                continue;
            };
            if ex_date < since || event.amount <= 0.0 {
                continue;
            }
            actions.push(CorporateAction::dividend(
                symbol,
                ex_date,
                decimal_of(event.amount, "dividend amount")?,
            ));
        }
    }

    if let Some(splits) = events.splits {
        for event in splits.into_values() {
            let Some(ex_date) = session_of(event.date) else {
                continue;
            };
            if ex_date < since || event.denominator == 0.0 {
                continue;
            }
            let ratio = event.numerator / event.denominator;
            if ratio <= 0.0 {
                continue;
            }
            actions.push(CorporateAction::split(
                symbol,
                ex_date,
                decimal_of(ratio, "split ratio")?,
            ));
        }
    }

    actions.sort_by_key(|action| (action.ex_date, action.action_type.as_str()));
    Ok(actions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use market_common::ActionType;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    // Two sessions: 2024-03-04 and 2024-03-05 (UTC midnights), second has a
    // null close and must be dropped
    const CHART_FIXTURE: &str = r#"{
        "chart": {
            "result": [{
                "timestamp": [1709510400, 1709596800],
                "indicators": {
                    "quote": [{
                        "open": [100.5, 101.0],
                        "high": [102.0, 103.0],
                        "low": [99.5, 100.0],
                        "close": [101.5, null],
                        "volume": [1200000, 1100000]
                    }],
                    "adjclose": [{ "adjclose": [101.2, null] }]
                }
            }],
            "error": null
        }
    }"#;

    const EVENTS_FIXTURE: &str = r#"{
        "chart": {
            "result": [{
                "timestamp": [1709510400],
                "indicators": { "quote": [{}] },
                "events": {
                    "dividends": {
                        "1709510400": { "amount": 0.24, "date": 1709510400 }
                    },
                    "splits": {
                        "1709596800": { "date": 1709596800, "numerator": 4.0, "denominator": 1.0 }
                    }
                }
            }],
            "error": null
        }
    }"#;

    const ERROR_FIXTURE: &str = r#"{
        "chart": {
            "result": null,
            "error": { "code": "Not Found", "description": "No data found" }
        }
    }"#;

    #[test]
    fn test_parse_daily_bars_drops_null_sessions() {
        let bars =
            parse_daily_bars("AAPL", CHART_FIXTURE, date(2024, 3, 1), date(2024, 3, 10)).unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].session, date(2024, 3, 4));
        assert_eq!(bars[0].volume, 1_200_000);
        assert!(bars[0].adjusted_close.is_some());
        assert!(bars[0].validate().is_ok());
    }

    #[test]
    fn test_parse_daily_bars_respects_range() {
        let bars =
            parse_daily_bars("AAPL", CHART_FIXTURE, date(2024, 3, 5), date(2024, 3, 10)).unwrap();
        assert!(bars.is_empty());
    }

    #[test]
    fn test_parse_corporate_actions() {
        let actions =
            parse_corporate_actions("AAPL", EVENTS_FIXTURE, date(2024, 3, 1)).unwrap();
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].action_type, ActionType::Dividend);
        assert_eq!(actions[0].ex_date, date(2024, 3, 4));
        assert_eq!(actions[1].action_type, ActionType::Split);
        assert_eq!(actions[1].split_ratio, Some(Decimal::from(4)));
    }

    #[test]
    fn test_parse_corporate_actions_since_filter() {
        let actions =
            parse_corporate_actions("AAPL", EVENTS_FIXTURE, date(2024, 3, 5)).unwrap();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].action_type, ActionType::Split);
    }

    #[test]
    fn test_chart_error_maps_to_symbol_not_found() {
        let err =
            parse_daily_bars("NOPE", ERROR_FIXTURE, date(2024, 3, 1), date(2024, 3, 10))
                .unwrap_err();
        assert!(matches!(err, ProviderError::SymbolNotFound(_)));
    }
}
