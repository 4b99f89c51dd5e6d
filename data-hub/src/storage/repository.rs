//! Bar store gateway
//!
//! The only write path for bar rows. Writes are idempotent upserts keyed by
//! `(symbol, session)`; re-applying the same batch produces the same stored
//! state. Invalid bars are rejected row-by-row so partial provider data
//! cannot corrupt previously-good rows.

use chrono::{Datelike, NaiveDate};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use market_common::{BarValidationError, DailyBar, ErrorCategory, ErrorClassification};

use crate::config::DatabaseSettings;

/// Repository errors
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Rejected bar for {symbol} on {session}: {source}")]
    Validation {
        symbol: String,
        session: NaiveDate,
        #[source]
        source: BarValidationError,
    },
}

impl ErrorClassification for RepositoryError {
    fn category(&self) -> ErrorCategory {
        match self {
            RepositoryError::Database(_) => ErrorCategory::Transient,
            RepositoryError::Configuration(_) => ErrorCategory::Configuration,
            RepositoryError::NotFound(_) => ErrorCategory::Permanent,
            RepositoryError::InvalidData(_) => ErrorCategory::Permanent,
            RepositoryError::Validation { .. } => ErrorCategory::Permanent,
        }
    }

    fn suggested_retry_delay(&self) -> Option<Duration> {
        match self {
            RepositoryError::Database(_) => Some(Duration::from_millis(500)),
            _ => None,
        }
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// A bar rejected by write-time validation
#[derive(Debug, Clone)]
pub struct RejectedBar {
    pub session: NaiveDate,
    pub reason: BarValidationError,
}

/// Outcome of a per-row upsert batch
#[derive(Debug, Clone, Default)]
pub struct UpsertReport {
    /// Rows written (inserted or overwritten)
    pub written: usize,
    /// Rows rejected by validation, batch continued without them
    pub rejected: Vec<RejectedBar>,
}

/// Statistics for a single symbol's bars
#[derive(Debug, Clone)]
pub struct SymbolStats {
    pub symbol: String,
    pub bar_count: u64,
    pub first_session: Option<NaiveDate>,
    pub latest_session: Option<NaiveDate>,
}

/// Overall bar-store statistics
#[derive(Debug, Clone)]
pub struct StoreStats {
    pub total_bars: u64,
    pub total_symbols: u64,
    pub first_session: Option<NaiveDate>,
    pub latest_session: Option<NaiveDate>,
    pub total_size: String,
}

const UPSERT_BAR_SQL: &str = r#"
    INSERT INTO bars (
        symbol, session, open, high, low, close, volume,
        adjusted_close, split_adjusted, dividend_adjusted
    ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
    ON CONFLICT (symbol, session) DO UPDATE SET
        open = EXCLUDED.open,
        high = EXCLUDED.high,
        low = EXCLUDED.low,
        close = EXCLUDED.close,
        volume = EXCLUDED.volume,
        adjusted_close = EXCLUDED.adjusted_close
"#;

/// Bar store gateway over the TimescaleDB pool
pub struct BarRepository {
    pool: PgPool,
}

impl BarRepository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new repository from settings
    pub async fn from_settings(settings: &DatabaseSettings) -> RepositoryResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .min_connections(settings.min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&settings.url)
            .await?;

        Ok(Self::new(pool))
    }

    /// Get the database pool reference
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Upsert a batch of bars for a symbol, row by row.
    ///
    /// Each bar is validated first; invalid bars land in the report's
    /// `rejected` list and do not abort the rest of the batch. Re-applying
    /// the same input yields the same stored state and the same counts.
    pub async fn upsert_bars(
        &self,
        symbol: &str,
        bars: &[DailyBar],
    ) -> RepositoryResult<UpsertReport> {
        let mut report = UpsertReport::default();

        for bar in bars {
            if let Err(reason) = bar.validate() {
                warn!(symbol, session = %bar.session, %reason, "rejecting invalid bar");
                report.rejected.push(RejectedBar {
                    session: bar.session,
                    reason,
                });
                continue;
            }

            self.bind_bar(sqlx::query(UPSERT_BAR_SQL), symbol, bar)
                .execute(&self.pool)
                .await?;
            report.written += 1;
        }

        debug!(symbol, written = report.written, rejected = report.rejected.len(), "upserted bars");
        Ok(report)
    }

    /// Upsert a batch of bars atomically.
    ///
    /// The first invalid bar fails the whole batch and nothing is written.
    /// Opt-in via `ingestion.atomic_batch`; the per-row path is the
    /// default.
    pub async fn upsert_bars_atomic(
        &self,
        symbol: &str,
        bars: &[DailyBar],
    ) -> RepositoryResult<usize> {
        for bar in bars {
            if let Err(source) = bar.validate() {
                return Err(RepositoryError::Validation {
                    symbol: symbol.to_string(),
                    session: bar.session,
                    source,
                });
            }
        }

        let mut tx = self.pool.begin().await?;
        for bar in bars {
            self.bind_bar(sqlx::query(UPSERT_BAR_SQL), symbol, bar)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        debug!(symbol, written = bars.len(), "upserted bars atomically");
        Ok(bars.len())
    }

    fn bind_bar<'q>(
        &self,
        query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
        symbol: &'q str,
        bar: &'q DailyBar,
    ) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
        query
            .bind(symbol)
            .bind(bar.session)
            .bind(bar.open)
            .bind(bar.high)
            .bind(bar.low)
            .bind(bar.close)
            .bind(bar.volume)
            .bind(bar.adjusted_close)
            .bind(bar.split_adjusted)
            .bind(bar.dividend_adjusted)
    }

    /// Fetch bars for a symbol in `[start, end]`, ascending by session.
    ///
    /// An empty result is not an error.
    pub async fn fetch_range(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> RepositoryResult<Vec<DailyBar>> {
        let rows = sqlx::query(
            r#"
            SELECT symbol, session, open, high, low, close, volume,
                   adjusted_close, split_adjusted, dividend_adjusted
            FROM bars
            WHERE symbol = $1 AND session >= $2 AND session <= $3
            ORDER BY session ASC
            "#,
        )
        .bind(symbol)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        let bars: Vec<DailyBar> = rows
            .iter()
            .map(|row| DailyBar {
                symbol: row.get("symbol"),
                session: row.get("session"),
                open: row.get("open"),
                high: row.get("high"),
                low: row.get("low"),
                close: row.get("close"),
                volume: row.get("volume"),
                adjusted_close: row.get("adjusted_close"),
                split_adjusted: row.get("split_adjusted"),
                dividend_adjusted: row.get("dividend_adjusted"),
            })
            .collect();

        Ok(bars)
    }

    /// Distinct sessions with a stored bar in `[start, end]`, ascending.
    ///
    /// Cheaper than `fetch_range` when only the dates matter (gap
    /// detection).
    pub async fn session_dates(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> RepositoryResult<Vec<NaiveDate>> {
        let rows = sqlx::query(
            r#"
            SELECT DISTINCT session
            FROM bars
            WHERE symbol = $1 AND session >= $2 AND session <= $3
            ORDER BY session ASC
            "#,
        )
        .bind(symbol)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(|row| row.get("session")).collect())
    }

    /// Bar counts per `(year, month)` bucket in `[start, end]`.
    ///
    /// Buckets with no bars are absent from the map; the completeness check
    /// fills those in from the calendar.
    pub async fn count_by_month(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> RepositoryResult<BTreeMap<(i32, u32), i64>> {
        let rows = sqlx::query(
            r#"
            SELECT date_trunc('month', session)::date AS month, COUNT(*) AS bar_count
            FROM bars
            WHERE symbol = $1 AND session >= $2 AND session <= $3
            GROUP BY 1
            ORDER BY 1
            "#,
        )
        .bind(symbol)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        let mut counts = BTreeMap::new();
        for row in rows {
            let month: NaiveDate = row.get("month");
            let count: i64 = row.get("bar_count");
            counts.insert((month.year(), month.month()), count);
        }

        Ok(counts)
    }

    /// Sessions holding more than one row for the symbol, with row counts.
    ///
    /// The upsert path cannot produce duplicates (the unique index is its
    /// conflict target); this audit catches bulk loads or write-path bugs
    /// that bypassed it.
    pub async fn find_duplicate_sessions(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> RepositoryResult<Vec<(NaiveDate, i64)>> {
        let rows = sqlx::query(
            r#"
            SELECT session, COUNT(*) AS row_count
            FROM bars
            WHERE symbol = $1 AND session >= $2 AND session <= $3
            GROUP BY session
            HAVING COUNT(*) > 1
            ORDER BY session ASC
            "#,
        )
        .bind(symbol)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| (row.get("session"), row.get("row_count")))
            .collect())
    }

    /// Per-symbol bar statistics
    pub async fn symbol_stats(&self, symbol: &str) -> RepositoryResult<SymbolStats> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS bar_count,
                   MIN(session) AS first_session,
                   MAX(session) AS latest_session
            FROM bars
            WHERE symbol = $1
            "#,
        )
        .bind(symbol)
        .fetch_one(&self.pool)
        .await?;

        Ok(SymbolStats {
            symbol: symbol.to_string(),
            bar_count: row.get::<i64, _>("bar_count") as u64,
            first_session: row.get("first_session"),
            latest_session: row.get("latest_session"),
        })
    }

    /// Overall bar-store statistics
    pub async fn store_stats(&self) -> RepositoryResult<StoreStats> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS total_bars,
                   COUNT(DISTINCT symbol) AS total_symbols,
                   MIN(session) AS first_session,
                   MAX(session) AS latest_session
            FROM bars
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        // Hypertable size is informational; absent outside TimescaleDB
        let size_row = sqlx::query("SELECT pg_size_pretty(hypertable_size('bars')) AS size")
            .fetch_optional(&self.pool)
            .await
            .ok()
            .flatten();

        let total_size = size_row
            .map(|r| r.get::<String, _>("size"))
            .unwrap_or_else(|| "unknown".to_string());

        Ok(StoreStats {
            total_bars: row.get::<i64, _>("total_bars") as u64,
            total_symbols: row.get::<i64, _>("total_symbols") as u64,
            first_session: row.get("first_session"),
            latest_session: row.get("latest_session"),
            total_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_rejected_bars_reported_with_reason() {
        let session = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let bad = DailyBar::new(
            "AAPL",
            session,
            Decimal::from(100),
            Decimal::from(95), // high below low
            Decimal::from(98),
            Decimal::from(96),
            1_000,
        );
        let reason = bad.validate().unwrap_err();
        let rejected = RejectedBar { session, reason };
        assert_eq!(rejected.session, session);
    }

    #[test]
    fn test_validation_error_is_permanent() {
        let err = RepositoryError::Validation {
            symbol: "AAPL".to_string(),
            session: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
            source: BarValidationError::EmptySymbol,
        };
        assert_eq!(err.category(), ErrorCategory::Permanent);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_database_error_suggests_retry() {
        let err = RepositoryError::Database(sqlx::Error::PoolTimedOut);
        assert_eq!(err.category(), ErrorCategory::Transient);
        assert_eq!(err.suggested_retry_delay(), Some(Duration::from_millis(500)));
    }
}
