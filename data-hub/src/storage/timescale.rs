//! TimescaleDB-specific operations
//!
//! Migrations and hypertable management for the bar store. The `bars`
//! hypertable is chunked monthly on the session date; the unique
//! `(symbol, session)` index is both the natural key and the upsert
//! conflict target. Any storage substitute must preserve that composite
//! key and the time partitioning for range-scan performance.

use sqlx::PgPool;
use tracing::{debug, info, warn};

use super::{RepositoryError, RepositoryResult};

/// TimescaleDB operations
pub struct TimescaleOperations {
    pool: PgPool,
}

impl TimescaleOperations {
    /// Create a new TimescaleDB operations helper
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run database migrations
    pub async fn run_migrations(&self) -> RepositoryResult<()> {
        info!("Running TimescaleDB migrations...");

        // Create TimescaleDB extension if not exists
        sqlx::query("CREATE EXTENSION IF NOT EXISTS timescaledb CASCADE")
            .execute(&self.pool)
            .await?;

        // Create bars table; OHLCV invariants are enforced here as well as
        // in application code
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS bars (
                symbol VARCHAR(20) NOT NULL,
                session DATE NOT NULL,
                open NUMERIC(20, 8) NOT NULL,
                high NUMERIC(20, 8) NOT NULL,
                low NUMERIC(20, 8) NOT NULL,
                close NUMERIC(20, 8) NOT NULL,
                volume BIGINT NOT NULL,
                adjusted_close NUMERIC(20, 8),
                split_adjusted BOOLEAN NOT NULL DEFAULT FALSE,
                dividend_adjusted BOOLEAN NOT NULL DEFAULT FALSE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                CONSTRAINT ck_bars_open_positive CHECK (open > 0),
                CONSTRAINT ck_bars_high_positive CHECK (high > 0),
                CONSTRAINT ck_bars_low_positive CHECK (low > 0),
                CONSTRAINT ck_bars_close_positive CHECK (close > 0),
                CONSTRAINT ck_bars_volume_non_negative CHECK (volume >= 0),
                CONSTRAINT ck_bars_high_gte_low CHECK (high >= low),
                CONSTRAINT ck_bars_high_gte_open CHECK (high >= open),
                CONSTRAINT ck_bars_high_gte_close CHECK (high >= close),
                CONSTRAINT ck_bars_low_lte_open CHECK (low <= open),
                CONSTRAINT ck_bars_low_lte_close CHECK (low <= close)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Convert to hypertable with monthly chunks (will fail gracefully
        // if already a hypertable)
        let result = sqlx::query(
            r#"
            SELECT create_hypertable(
                'bars',
                'session',
                chunk_time_interval => INTERVAL '1 month',
                if_not_exists => TRUE
            )
            "#,
        )
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => info!("Created bars hypertable"),
            Err(e) => {
                if e.to_string().contains("already a hypertable") {
                    debug!("bars is already a hypertable");
                } else {
                    warn!("Failed to create hypertable: {}", e);
                }
            }
        }

        // Natural key and upsert conflict target
        sqlx::query(
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS uq_bars_symbol_session
            ON bars (symbol, session)
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_bars_session
            ON bars (session DESC)
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Create symbol_map table
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS symbol_map (
                id SERIAL PRIMARY KEY,
                symbol VARCHAR(20) NOT NULL UNIQUE,
                name VARCHAR(255),
                exchange VARCHAR(50),
                asset_type VARCHAR(20) NOT NULL DEFAULT 'equity',
                sector VARCHAR(100),
                industry VARCHAR(100),
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                data_source VARCHAR(50) NOT NULL DEFAULT 'yahoo',
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Create corporate_actions table; surrogate id, de-duplication on
        // (symbol, ex_date, action_type) happens in the tracker
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS corporate_actions (
                id SERIAL PRIMARY KEY,
                symbol VARCHAR(20) NOT NULL,
                action_type VARCHAR(20) NOT NULL,
                ex_date DATE NOT NULL,
                split_ratio NUMERIC(12, 6),
                dividend_amount NUMERIC(12, 6),
                processed BOOLEAN NOT NULL DEFAULT FALSE,
                processed_at TIMESTAMPTZ,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_corp_actions_symbol_date
            ON corporate_actions (symbol, ex_date)
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_corp_actions_unprocessed
            ON corporate_actions (processed, ex_date)
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Create data_quality_log table
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS data_quality_log (
                id SERIAL PRIMARY KEY,
                symbol VARCHAR(20) NOT NULL,
                check_type VARCHAR(50) NOT NULL,
                severity VARCHAR(20) NOT NULL,
                check_time TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                date_range_start DATE NOT NULL,
                date_range_end DATE NOT NULL,
                issue_count INTEGER NOT NULL DEFAULT 0,
                details JSONB,
                resolved BOOLEAN NOT NULL DEFAULT FALSE,
                resolved_at TIMESTAMPTZ
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_dq_log_symbol_check_time
            ON data_quality_log (symbol, check_type, check_time DESC)
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_dq_log_check_time
            ON data_quality_log (check_time DESC)
            "#,
        )
        .execute(&self.pool)
        .await?;

        info!("TimescaleDB migrations completed");
        Ok(())
    }

    /// Enable compression on the bars hypertable
    pub async fn enable_compression(&self) -> RepositoryResult<()> {
        info!("Enabling compression on bars...");

        sqlx::query(
            r#"
            ALTER TABLE bars SET (
                timescaledb.compress,
                timescaledb.compress_segmentby = 'symbol',
                timescaledb.compress_orderby = 'session DESC'
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        info!("Compression enabled");
        Ok(())
    }

    /// Add compression policy
    pub async fn add_compression_policy(&self, after_days: i32) -> RepositoryResult<()> {
        if after_days <= 0 {
            return Err(RepositoryError::Configuration(format!(
                "Compression policy days must be positive, got {}",
                after_days
            )));
        }

        info!(
            "Adding compression policy (compress after {} days)...",
            after_days
        );

        let query = format!(
            r#"
            SELECT add_compression_policy(
                'bars',
                INTERVAL '{} days',
                if_not_exists => TRUE
            )
            "#,
            after_days
        );

        sqlx::query(&query).execute(&self.pool).await?;

        info!("Compression policy added");
        Ok(())
    }
}
