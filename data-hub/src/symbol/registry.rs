//! Database-backed symbol registry

use sqlx::{PgPool, Row};
use tracing::debug;

use crate::storage::{RepositoryError, RepositoryResult};

use super::{AssetType, NewSymbol, TrackedSymbol};

/// Symbol registry backed by the database
pub struct SymbolRegistry {
    pool: PgPool,
}

impl SymbolRegistry {
    /// Create a new symbol registry
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Register a symbol, or refresh its metadata if already present.
    ///
    /// Registration never deactivates an existing symbol.
    pub async fn register(&self, new: &NewSymbol) -> RepositoryResult<i32> {
        let row = sqlx::query(
            r#"
            INSERT INTO symbol_map (symbol, name, exchange, asset_type, sector, industry, is_active, data_source)
            VALUES ($1, $2, $3, $4, $5, $6, TRUE, $7)
            ON CONFLICT (symbol) DO UPDATE
            SET name = COALESCE(EXCLUDED.name, symbol_map.name),
                exchange = COALESCE(EXCLUDED.exchange, symbol_map.exchange),
                asset_type = EXCLUDED.asset_type,
                sector = COALESCE(EXCLUDED.sector, symbol_map.sector),
                industry = COALESCE(EXCLUDED.industry, symbol_map.industry),
                data_source = EXCLUDED.data_source,
                updated_at = NOW()
            RETURNING id
            "#,
        )
        .bind(&new.symbol)
        .bind(&new.name)
        .bind(&new.exchange)
        .bind(new.asset_type.as_str())
        .bind(&new.sector)
        .bind(&new.industry)
        .bind(&new.data_source)
        .fetch_one(&self.pool)
        .await?;

        let id: i32 = row.get("id");
        debug!(symbol = %new.symbol, id, "registered symbol");
        Ok(id)
    }

    /// Get a symbol by ticker
    pub async fn get(&self, symbol: &str) -> RepositoryResult<Option<TrackedSymbol>> {
        let row = sqlx::query(
            r#"
            SELECT id, symbol, name, exchange, asset_type, sector, industry,
                   is_active, data_source, created_at, updated_at
            FROM symbol_map
            WHERE symbol = $1
            "#,
        )
        .bind(symbol)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(row_to_symbol(&row)?)),
            None => Ok(None),
        }
    }

    /// List all registered symbols
    pub async fn list(&self) -> RepositoryResult<Vec<TrackedSymbol>> {
        let rows = sqlx::query(
            r#"
            SELECT id, symbol, name, exchange, asset_type, sector, industry,
                   is_active, data_source, created_at, updated_at
            FROM symbol_map
            ORDER BY symbol
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_symbol).collect()
    }

    /// Ticker strings of all active symbols, the working set for every job
    pub async fn active_symbols(&self) -> RepositoryResult<Vec<String>> {
        let rows = sqlx::query(
            r#"
            SELECT symbol FROM symbol_map
            WHERE is_active = TRUE
            ORDER BY symbol
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(|row| row.get("symbol")).collect())
    }

    /// Toggle a symbol's active flag. Returns false for unknown symbols.
    pub async fn set_active(&self, symbol: &str, active: bool) -> RepositoryResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE symbol_map
            SET is_active = $2, updated_at = NOW()
            WHERE symbol = $1
            "#,
        )
        .bind(symbol)
        .bind(active)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Get count of registered symbols
    pub async fn count(&self) -> RepositoryResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM symbol_map")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("count"))
    }
}

fn row_to_symbol(row: &sqlx::postgres::PgRow) -> RepositoryResult<TrackedSymbol> {
    let type_str: String = row.get("asset_type");
    let asset_type = AssetType::from_str(&type_str).ok_or_else(|| {
        RepositoryError::InvalidData(format!("unknown asset type '{}'", type_str))
    })?;

    Ok(TrackedSymbol {
        id: row.get("id"),
        symbol: row.get("symbol"),
        name: row.get("name"),
        exchange: row.get("exchange"),
        asset_type,
        sector: row.get("sector"),
        industry: row.get("industry"),
        is_active: row.get("is_active"),
        data_source: row.get("data_source"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}
