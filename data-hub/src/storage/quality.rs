//! Quality-finding storage

use chrono::{Duration, Utc};
use sqlx::{PgPool, Row};
use tracing::debug;

use market_common::{CheckType, QualityFinding, Severity};

use super::{RepositoryError, RepositoryResult};

/// Store for data-quality check results.
///
/// The quality engine is the sole writer of new findings; `resolve` is the
/// only mutation and belongs to the (external) resolution workflow.
pub struct QualityLogStore {
    pool: PgPool,
}

impl QualityLogStore {
    /// Create a new store
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Persist a finding, returning its id.
    pub async fn insert(&self, finding: &QualityFinding) -> RepositoryResult<i32> {
        let row = sqlx::query(
            r#"
            INSERT INTO data_quality_log (
                symbol, check_type, severity, check_time,
                date_range_start, date_range_end, issue_count, details, resolved
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, FALSE)
            RETURNING id
            "#,
        )
        .bind(&finding.symbol)
        .bind(finding.check_type.as_str())
        .bind(finding.severity.as_str())
        .bind(finding.check_time)
        .bind(finding.range_start)
        .bind(finding.range_end)
        .bind(finding.issue_count)
        .bind(&finding.details)
        .fetch_one(&self.pool)
        .await?;

        let id: i32 = row.get("id");
        debug!(
            symbol = %finding.symbol,
            check = %finding.check_type,
            issues = finding.issue_count,
            id,
            "logged quality finding"
        );
        Ok(id)
    }

    /// Unresolved findings from the last `days` days, newest first,
    /// optionally filtered by symbol and severity.
    pub async fn recent_findings(
        &self,
        symbol: Option<&str>,
        days: i64,
        severity: Option<Severity>,
    ) -> RepositoryResult<Vec<QualityFinding>> {
        let cutoff = Utc::now() - Duration::days(days);

        let rows = sqlx::query(
            r#"
            SELECT id, symbol, check_type, severity, check_time,
                   date_range_start, date_range_end, issue_count, details,
                   resolved, resolved_at
            FROM data_quality_log
            WHERE check_time >= $1
              AND resolved = FALSE
              AND ($2::text IS NULL OR symbol = $2)
              AND ($3::text IS NULL OR severity = $3)
            ORDER BY check_time DESC
            "#,
        )
        .bind(cutoff)
        .bind(symbol)
        .bind(severity.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_finding).collect()
    }

    /// Mark a finding resolved. Returns false if it was already resolved.
    pub async fn resolve(&self, id: i32) -> RepositoryResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE data_quality_log
            SET resolved = TRUE, resolved_at = NOW()
            WHERE id = $1 AND resolved = FALSE
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

fn row_to_finding(row: &sqlx::postgres::PgRow) -> RepositoryResult<QualityFinding> {
    let check_str: String = row.get("check_type");
    let check_type = CheckType::from_str(&check_str).ok_or_else(|| {
        RepositoryError::InvalidData(format!("unknown check type '{}'", check_str))
    })?;

    let severity_str: String = row.get("severity");
    let severity = Severity::from_str(&severity_str).ok_or_else(|| {
        RepositoryError::InvalidData(format!("unknown severity '{}'", severity_str))
    })?;

    Ok(QualityFinding {
        id: Some(row.get("id")),
        symbol: row.get("symbol"),
        check_type,
        severity,
        check_time: row.get("check_time"),
        range_start: row.get("date_range_start"),
        range_end: row.get("date_range_end"),
        issue_count: row.get("issue_count"),
        details: row.get("details"),
        resolved: row.get("resolved"),
        resolved_at: row.get("resolved_at"),
    })
}
