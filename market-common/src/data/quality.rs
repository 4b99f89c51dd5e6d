//! Data-quality check results

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// The check that produced a finding.
///
/// Closed set on purpose: adding a check kind must be a compile-time
/// decision, not a free-form string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CheckType {
    Duplicate,
    Completeness,
    PriceAnomaly,
    VolumeAnomaly,
}

impl CheckType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckType::Duplicate => "duplicate",
            CheckType::Completeness => "completeness",
            CheckType::PriceAnomaly => "price_anomaly",
            CheckType::VolumeAnomaly => "volume_anomaly",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "duplicate" => Some(CheckType::Duplicate),
            "completeness" => Some(CheckType::Completeness),
            "price_anomaly" => Some(CheckType::PriceAnomaly),
            "volume_anomaly" => Some(CheckType::VolumeAnomaly),
            _ => None,
        }
    }
}

impl std::fmt::Display for CheckType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity of a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "warning" => Some(Severity::Warning),
            "error" => Some(Severity::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one quality-check invocation over a symbol and date range.
///
/// One record per invocation, not per issue; `details` carries the
/// per-issue breakdown. `resolved` is flipped later by the resolution
/// workflow, never by the engine that wrote the finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityFinding {
    /// Surrogate id, absent until stored
    pub id: Option<i32>,
    pub symbol: String,
    pub check_type: CheckType,
    pub severity: Severity,
    pub check_time: DateTime<Utc>,
    pub range_start: NaiveDate,
    pub range_end: NaiveDate,
    pub issue_count: i32,
    pub details: Option<serde_json::Value>,
    pub resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl QualityFinding {
    pub fn new(
        symbol: impl Into<String>,
        check_type: CheckType,
        severity: Severity,
        range_start: NaiveDate,
        range_end: NaiveDate,
        issue_count: i32,
    ) -> Self {
        Self {
            id: None,
            symbol: symbol.into(),
            check_type,
            severity,
            check_time: Utc::now(),
            range_start,
            range_end,
            issue_count,
            details: None,
            resolved: false,
            resolved_at: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_type_round_trip() {
        for check in [
            CheckType::Duplicate,
            CheckType::Completeness,
            CheckType::PriceAnomaly,
            CheckType::VolumeAnomaly,
        ] {
            assert_eq!(CheckType::from_str(check.as_str()), Some(check));
        }
        assert_eq!(CheckType::from_str("latency"), None);
    }

    #[test]
    fn test_severity_round_trip() {
        assert_eq!(Severity::from_str("error"), Some(Severity::Error));
        assert_eq!(Severity::from_str("info"), None);
    }

    #[test]
    fn test_finding_starts_unresolved() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        let finding =
            QualityFinding::new("AAPL", CheckType::Duplicate, Severity::Error, start, end, 2);
        assert!(!finding.resolved);
        assert!(finding.resolved_at.is_none());
        assert!(finding.details.is_none());
    }
}
