//! Quality-check engine
//!
//! Each check produces findings for one symbol and date range and persists
//! them. Zero-issue findings are persisted too: the audit trail records
//! that the check ran, not just that it complained. Checks are isolated,
//! so one failing check never stops the others.

use chrono::NaiveDate;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, warn};

use market_common::{calendar, CheckType, DailyBar, QualityFinding, Severity};

use crate::config::QualitySettings;
use crate::quality::stats;
use crate::storage::{BarRepository, QualityLogStore, RepositoryError};

/// A check that could not run to completion
#[derive(Debug, Clone)]
pub struct CheckFailure {
    pub check_type: CheckType,
    pub error: String,
}

/// Outcome of `run_all_checks` for one symbol
#[derive(Debug, Clone, Default)]
pub struct CheckRun {
    /// Findings persisted, in check order
    pub findings: Vec<QualityFinding>,
    /// Checks that failed to execute or persist
    pub failures: Vec<CheckFailure>,
}

/// Data-quality engine: read-only over bars, write-only over findings
pub struct QualityEngine {
    bars: Arc<BarRepository>,
    log: Arc<QualityLogStore>,
    settings: QualitySettings,
}

impl QualityEngine {
    /// Create a new engine
    pub fn new(
        bars: Arc<BarRepository>,
        log: Arc<QualityLogStore>,
        settings: QualitySettings,
    ) -> Self {
        Self { bars, log, settings }
    }

    /// Duplicate-key audit over `[start, end]`.
    pub async fn check_duplicates(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<QualityFinding, RepositoryError> {
        let duplicates = self.bars.find_duplicate_sessions(symbol, start, end).await?;
        Ok(duplicate_finding(
            symbol,
            start,
            end,
            &duplicates,
            self.settings.max_detail_entries,
        ))
    }

    /// Bars-per-month completeness over `[start, end]`.
    pub async fn check_completeness(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<QualityFinding, RepositoryError> {
        let counts = self.bars.count_by_month(symbol, start, end).await?;
        Ok(completeness_finding(
            symbol,
            start,
            end,
            &counts,
            self.settings.min_bars_per_month,
        ))
    }

    /// Price- and volume-anomaly detection over `[start, end]`.
    ///
    /// Returns one finding per anomaly kind.
    pub async fn check_anomalies(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<QualityFinding>, RepositoryError> {
        let bars = self.bars.fetch_range(symbol, start, end).await?;
        Ok(anomaly_findings(symbol, start, end, &bars, &self.settings))
    }

    /// Run every check, persisting each finding.
    ///
    /// A failure in one check (or in persisting its finding) is recorded
    /// and the remaining checks still run.
    pub async fn run_all_checks(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> CheckRun {
        info!(symbol, %start, %end, "running quality checks");
        let mut run = CheckRun::default();

        match self.check_duplicates(symbol, start, end).await {
            Ok(finding) => self.persist(finding, &mut run).await,
            Err(e) => record_failure(&mut run, CheckType::Duplicate, e),
        }

        match self.check_completeness(symbol, start, end).await {
            Ok(finding) => self.persist(finding, &mut run).await,
            Err(e) => record_failure(&mut run, CheckType::Completeness, e),
        }

        match self.check_anomalies(symbol, start, end).await {
            Ok(findings) => {
                for finding in findings {
                    self.persist(finding, &mut run).await;
                }
            }
            Err(e) => record_failure(&mut run, CheckType::PriceAnomaly, e),
        }

        for finding in &run.findings {
            if finding.issue_count > 0 {
                warn!(
                    symbol,
                    check = %finding.check_type,
                    severity = %finding.severity,
                    issues = finding.issue_count,
                    "quality check found issues"
                );
            }
        }

        run
    }

    /// Unresolved findings from the last `days` days.
    pub async fn recent_findings(
        &self,
        symbol: Option<&str>,
        days: i64,
        severity: Option<Severity>,
    ) -> Result<Vec<QualityFinding>, RepositoryError> {
        self.log.recent_findings(symbol, days, severity).await
    }

    async fn persist(&self, mut finding: QualityFinding, run: &mut CheckRun) {
        match self.log.insert(&finding).await {
            Ok(id) => {
                finding.id = Some(id);
                run.findings.push(finding);
            }
            Err(e) => record_failure(run, finding.check_type, e),
        }
    }
}

fn record_failure(run: &mut CheckRun, check_type: CheckType, error: RepositoryError) {
    error!(check = %check_type, %error, "quality check failed");
    run.failures.push(CheckFailure {
        check_type,
        error: error.to_string(),
    });
}

/// Build the duplicate finding from sessions with surplus rows.
///
/// `issue_count` is the number of rows involved in duplication, so a
/// session inserted twice contributes 2.
fn duplicate_finding(
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
    duplicates: &[(NaiveDate, i64)],
    max_details: usize,
) -> QualityFinding {
    let issue_count: i64 = duplicates.iter().map(|(_, rows)| rows).sum();
    let severity = if issue_count > 0 {
        Severity::Error
    } else {
        Severity::Warning
    };

    let mut finding = QualityFinding::new(
        symbol,
        CheckType::Duplicate,
        severity,
        start,
        end,
        issue_count as i32,
    );

    if !duplicates.is_empty() {
        let entries: Vec<serde_json::Value> = duplicates
            .iter()
            .take(max_details)
            .map(|(session, rows)| json!({ "session": session.to_string(), "rows": rows }))
            .collect();
        finding = finding.with_details(json!(entries));
    }

    finding
}

/// Build the completeness finding from month-bucket counts.
///
/// Every month intersecting the range is graded; a month with no stored
/// bars at all counts as zero. The threshold assumes weekends only, so
/// holiday-heavy months can warn spuriously.
fn completeness_finding(
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
    counts: &BTreeMap<(i32, u32), i64>,
    min_bars_per_month: i64,
) -> QualityFinding {
    let incomplete: Vec<((i32, u32), i64)> = calendar::month_buckets(start, end)
        .into_iter()
        .map(|bucket| (bucket, counts.get(&bucket).copied().unwrap_or(0)))
        .filter(|(_, count)| *count < min_bars_per_month)
        .collect();

    let mut finding = QualityFinding::new(
        symbol,
        CheckType::Completeness,
        Severity::Warning,
        start,
        end,
        incomplete.len() as i32,
    );

    if !incomplete.is_empty() {
        let entries: Vec<serde_json::Value> = incomplete
            .iter()
            .map(|((year, month), count)| {
                json!({ "month": format!("{:04}-{:02}", year, month), "bar_count": count })
            })
            .collect();
        finding = finding.with_details(json!(entries));
    }

    finding
}

/// Build the price- and volume-anomaly findings from fetched bars.
fn anomaly_findings(
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
    bars: &[DailyBar],
    settings: &QualitySettings,
) -> Vec<QualityFinding> {
    let price_outliers = stats::detect_outliers(
        &stats::daily_returns(bars),
        settings.price_spike_sigma,
    );
    let volume_outliers = stats::detect_outliers(
        &stats::volume_series(bars),
        settings.volume_spike_sigma,
    );

    let mut price = QualityFinding::new(
        symbol,
        CheckType::PriceAnomaly,
        Severity::Warning,
        start,
        end,
        price_outliers.len() as i32,
    );
    if !price_outliers.is_empty() {
        let entries: Vec<serde_json::Value> = price_outliers
            .iter()
            .take(settings.max_detail_entries)
            .map(|o| {
                json!({
                    "session": o.session.to_string(),
                    "return_pct": (o.value * 100.0 * 100.0).round() / 100.0,
                    "z_score": (o.z_score * 100.0).round() / 100.0,
                })
            })
            .collect();
        price = price.with_details(json!(entries));
    }

    let mut volume = QualityFinding::new(
        symbol,
        CheckType::VolumeAnomaly,
        Severity::Warning,
        start,
        end,
        volume_outliers.len() as i32,
    );
    if !volume_outliers.is_empty() {
        let entries: Vec<serde_json::Value> = volume_outliers
            .iter()
            .take(settings.max_detail_entries)
            .map(|o| {
                json!({
                    "session": o.session.to_string(),
                    "volume": o.value as i64,
                    "z_score": (o.z_score * 100.0).round() / 100.0,
                })
            })
            .collect();
        volume = volume.with_details(json!(entries));
    }

    vec![price, volume]
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn bar(session: NaiveDate, close: i64, volume: i64) -> DailyBar {
        DailyBar::new(
            "TEST",
            session,
            Decimal::from(close),
            Decimal::from(close + 2),
            Decimal::from(close - 2),
            Decimal::from(close),
            volume,
        )
    }

    #[test]
    fn test_duplicate_finding_counts_involved_rows() {
        let start = date(2024, 1, 1);
        let end = date(2024, 1, 31);
        // One session inserted twice via some bulk path
        let finding = duplicate_finding("TEST", start, end, &[(date(2024, 1, 10), 2)], 100);
        assert_eq!(finding.issue_count, 2);
        assert_eq!(finding.severity, Severity::Error);
        assert!(finding.details.is_some());
    }

    #[test]
    fn test_clean_duplicate_check_still_produces_finding() {
        let finding = duplicate_finding("TEST", date(2024, 1, 1), date(2024, 1, 31), &[], 100);
        assert_eq!(finding.issue_count, 0);
        assert_eq!(finding.severity, Severity::Warning);
        assert!(finding.details.is_none());
    }

    #[test]
    fn test_short_month_produces_one_warning() {
        let start = date(2024, 1, 1);
        let end = date(2024, 1, 31);
        let mut counts = BTreeMap::new();
        counts.insert((2024, 1), 15i64);

        let finding = completeness_finding("TEST", start, end, &counts, 20);
        assert_eq!(finding.severity, Severity::Warning);
        assert_eq!(finding.issue_count, 1);
        let details = finding.details.unwrap();
        assert_eq!(details[0]["month"], "2024-01");
        assert_eq!(details[0]["bar_count"], 15);
    }

    #[test]
    fn test_month_with_no_bars_counts_as_incomplete() {
        // Range spans two months but only one has any bars
        let start = date(2024, 1, 1);
        let end = date(2024, 2, 29);
        let mut counts = BTreeMap::new();
        counts.insert((2024, 1), 22i64);

        let finding = completeness_finding("TEST", start, end, &counts, 20);
        assert_eq!(finding.issue_count, 1);
        let details = finding.details.unwrap();
        assert_eq!(details[0]["month"], "2024-02");
        assert_eq!(details[0]["bar_count"], 0);
    }

    #[test]
    fn test_complete_months_produce_zero_count_finding() {
        let start = date(2024, 1, 1);
        let end = date(2024, 1, 31);
        let mut counts = BTreeMap::new();
        counts.insert((2024, 1), 22i64);

        let finding = completeness_finding("TEST", start, end, &counts, 20);
        assert_eq!(finding.issue_count, 0);
        assert!(finding.details.is_none());
    }

    #[test]
    fn test_extreme_return_flagged_as_price_anomaly() {
        let settings = QualitySettings::default();
        let start = date(2024, 3, 1);
        let end = date(2024, 4, 30);

        // Two months of ±1% noise, then one 60% jump. The long quiet run
        // matters: population statistics include the spike itself, so a
        // single outlier among n points tops out near sqrt(n) sigmas.
        let mut bars = Vec::new();
        let mut close = 1000i64;
        for (i, session) in calendar::expected_sessions(start, date(2024, 4, 26))
            .into_iter()
            .enumerate()
        {
            close = if i % 2 == 0 { close + 10 } else { close - 10 };
            bars.push(bar(session, close, 1_000_000));
        }
        assert!(bars.len() >= 40);
        bars.push(bar(date(2024, 4, 29), close + 600, 1_000_000));

        let findings = anomaly_findings("TEST", start, end, &bars, &settings);
        assert_eq!(findings.len(), 2);

        let price = &findings[0];
        assert_eq!(price.check_type, CheckType::PriceAnomaly);
        assert_eq!(price.issue_count, 1);
        assert_eq!(price.severity, Severity::Warning);

        let volume = &findings[1];
        assert_eq!(volume.check_type, CheckType::VolumeAnomaly);
        assert_eq!(volume.issue_count, 0);
    }

    #[test]
    fn test_constant_series_produces_no_anomalies() {
        let settings = QualitySettings::default();
        let start = date(2024, 3, 1);
        let end = date(2024, 3, 29);

        let bars: Vec<DailyBar> = calendar::expected_sessions(start, end)
            .into_iter()
            .map(|session| bar(session, 500, 750_000))
            .collect();

        let findings = anomaly_findings("TEST", start, end, &bars, &settings);
        assert!(findings.iter().all(|f| f.issue_count == 0));
    }

    #[test]
    fn test_degenerate_input_is_not_an_error() {
        let settings = QualitySettings::default();
        let start = date(2024, 3, 1);
        let end = date(2024, 3, 29);

        let findings = anomaly_findings("TEST", start, end, &[], &settings);
        assert_eq!(findings.len(), 2);
        assert!(findings.iter().all(|f| f.issue_count == 0));
    }
}
