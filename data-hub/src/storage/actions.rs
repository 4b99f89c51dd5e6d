//! Corporate-action storage

use chrono::NaiveDate;
use sqlx::{PgPool, Row};
use std::collections::HashSet;
use tracing::debug;

use market_common::{ActionType, CorporateAction};

use super::{RepositoryError, RepositoryResult};

/// Store for split/dividend events.
///
/// Rows carry a surrogate id; uniqueness on `(symbol, ex_date,
/// action_type)` is the tracker's responsibility via `existing_keys`.
pub struct CorporateActionStore {
    pool: PgPool,
}

impl CorporateActionStore {
    /// Create a new store
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Natural keys already stored for a symbol since the given date.
    pub async fn existing_keys(
        &self,
        symbol: &str,
        since: NaiveDate,
    ) -> RepositoryResult<HashSet<(NaiveDate, ActionType)>> {
        let rows = sqlx::query(
            r#"
            SELECT ex_date, action_type
            FROM corporate_actions
            WHERE symbol = $1 AND ex_date >= $2
            "#,
        )
        .bind(symbol)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        let mut keys = HashSet::new();
        for row in rows {
            let ex_date: NaiveDate = row.get("ex_date");
            let type_str: String = row.get("action_type");
            if let Some(action_type) = ActionType::from_str(&type_str) {
                keys.insert((ex_date, action_type));
            }
        }

        Ok(keys)
    }

    /// Insert a new event, returning its id.
    pub async fn insert(&self, action: &CorporateAction) -> RepositoryResult<i32> {
        let row = sqlx::query(
            r#"
            INSERT INTO corporate_actions (
                symbol, action_type, ex_date, split_ratio, dividend_amount, processed
            ) VALUES ($1, $2, $3, $4, $5, FALSE)
            RETURNING id
            "#,
        )
        .bind(&action.symbol)
        .bind(action.action_type.as_str())
        .bind(action.ex_date)
        .bind(action.split_ratio)
        .bind(action.dividend_amount)
        .fetch_one(&self.pool)
        .await?;

        let id: i32 = row.get("id");
        debug!(symbol = %action.symbol, action = %action.action_type, ex_date = %action.ex_date, id, "stored corporate action");
        Ok(id)
    }

    /// Unprocessed events, ascending by ex-date, optionally for one symbol.
    pub async fn list_unprocessed(
        &self,
        symbol: Option<&str>,
    ) -> RepositoryResult<Vec<CorporateAction>> {
        let rows = match symbol {
            Some(symbol) => {
                sqlx::query(
                    r#"
                    SELECT id, symbol, action_type, ex_date, split_ratio,
                           dividend_amount, processed, processed_at, created_at
                    FROM corporate_actions
                    WHERE processed = FALSE AND symbol = $1
                    ORDER BY ex_date ASC, id ASC
                    "#,
                )
                .bind(symbol)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT id, symbol, action_type, ex_date, split_ratio,
                           dividend_amount, processed, processed_at, created_at
                    FROM corporate_actions
                    WHERE processed = FALSE
                    ORDER BY ex_date ASC, id ASC
                    "#,
                )
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.iter().map(row_to_action).collect()
    }

    /// Flip an event to processed. Returns false if it was already
    /// processed (the flag flips exactly once).
    pub async fn mark_processed(&self, id: i32) -> RepositoryResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE corporate_actions
            SET processed = TRUE, processed_at = NOW()
            WHERE id = $1 AND processed = FALSE
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

fn row_to_action(row: &sqlx::postgres::PgRow) -> RepositoryResult<CorporateAction> {
    let type_str: String = row.get("action_type");
    let action_type = ActionType::from_str(&type_str).ok_or_else(|| {
        RepositoryError::InvalidData(format!("unknown action type '{}'", type_str))
    })?;

    Ok(CorporateAction {
        id: Some(row.get("id")),
        symbol: row.get("symbol"),
        action_type,
        ex_date: row.get("ex_date"),
        split_ratio: row.get("split_ratio"),
        dividend_amount: row.get("dividend_amount"),
        processed: row.get("processed"),
        processed_at: row.get("processed_at"),
        created_at: row.get("created_at"),
    })
}
