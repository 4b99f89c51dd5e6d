//! Gap detection and repair
//!
//! Finds expected trading sessions with no stored bar and drives targeted
//! re-ingestion for exactly those sessions. Missing dates are merged into
//! maximal contiguous runs so the provider sees one request per hole, not
//! one per day. Repair never writes bars itself; it goes through the same
//! ingestion path as the scheduled fetch.
//!
//! Repair is eventually consistent: a provider that cannot fill a run
//! today leaves those sessions missing for tomorrow's pass.

use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{debug, info};

use market_common::gaps;

use crate::ingest::{IngestError, IngestService};
use crate::storage::BarRepository;

/// Outcome of one repair pass over a symbol and range
#[derive(Debug, Clone, Copy, Default)]
pub struct RepairReport {
    /// Missing sessions found before repair
    pub missing: usize,
    /// Contiguous runs the missing sessions merged into
    pub runs: usize,
    /// Bars written by re-ingestion
    pub written: usize,
    /// Bars rejected by validation during re-ingestion
    pub rejected: usize,
}

/// Gap detector and repair engine
pub struct RepairService {
    bars: Arc<BarRepository>,
    ingest: Arc<IngestService>,
}

impl RepairService {
    /// Create a new repair service
    pub fn new(bars: Arc<BarRepository>, ingest: Arc<IngestService>) -> Self {
        Self { bars, ingest }
    }

    /// Expected sessions in `[start, end]` with no stored bar, ascending.
    ///
    /// A symbol with zero stored bars reports the entire range as missing.
    pub async fn find_missing(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<NaiveDate>, IngestError> {
        let observed = self.bars.session_dates(symbol, start, end).await?;
        let missing = gaps::missing_sessions(start, end, &observed);

        if !missing.is_empty() {
            debug!(symbol, %start, %end, missing = missing.len(), "found missing sessions");
        }

        Ok(missing)
    }

    /// Detect gaps in `[start, end]` and re-ingest one request per run.
    pub async fn repair_range(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<RepairReport, IngestError> {
        let missing = self.find_missing(symbol, start, end).await?;

        if missing.is_empty() {
            debug!(symbol, %start, %end, "no gaps to repair");
            return Ok(RepairReport::default());
        }

        let runs = gaps::merge_into_runs(&missing);
        let mut report = RepairReport {
            missing: missing.len(),
            runs: runs.len(),
            ..RepairReport::default()
        };

        for run in &runs {
            let ingested = self.ingest.ingest_range(symbol, run.start, run.end).await?;
            report.written += ingested.written;
            report.rejected += ingested.rejected;
        }

        info!(
            symbol,
            missing = report.missing,
            runs = report.runs,
            written = report.written,
            "repaired missing bars"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use std::collections::HashSet;

    use market_common::{calendar, gaps};

    use crate::provider::{EodProvider, MockProvider};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_repair_converges_when_provider_has_the_data() {
        // Stored bars cover Mon, Tue, Fri of one week; Wed and Thu are
        // missing and the provider can supply them
        let start = date(2024, 3, 4);
        let end = date(2024, 3, 8);
        let mut observed = vec![date(2024, 3, 4), date(2024, 3, 5), date(2024, 3, 8)];

        let missing = gaps::missing_sessions(start, end, &observed);
        assert_eq!(missing, vec![date(2024, 3, 6), date(2024, 3, 7)]);

        let runs = gaps::merge_into_runs(&missing);
        assert_eq!(runs.len(), 1);

        // One provider request per run, upserted through the ingest path
        let provider = MockProvider::new();
        for run in &runs {
            let bars = provider
                .fetch_daily_bars("TEST", run.start, run.end)
                .await
                .unwrap();
            observed.extend(bars.iter().map(|bar| bar.session));
        }

        // A second detection pass over the same range finds nothing
        assert!(gaps::missing_sessions(start, end, &observed).is_empty());
    }

    #[tokio::test]
    async fn test_partial_provider_response_leaves_sessions_missing() {
        // The provider cannot supply Thursday; repair stores what arrived
        // and the gap survives for the next pass
        let start = date(2024, 3, 4);
        let end = date(2024, 3, 8);
        let mut observed = vec![date(2024, 3, 4), date(2024, 3, 5)];

        let missing = gaps::missing_sessions(start, end, &observed);
        let runs = gaps::merge_into_runs(&missing);

        let provider = MockProvider::new().with_omitted_sessions([date(2024, 3, 7)]);
        for run in &runs {
            let bars = provider
                .fetch_daily_bars("TEST", run.start, run.end)
                .await
                .unwrap();
            observed.extend(bars.iter().map(|bar| bar.session));
        }

        let still_missing: HashSet<NaiveDate> =
            gaps::missing_sessions(start, end, &observed).into_iter().collect();
        assert_eq!(still_missing, HashSet::from([date(2024, 3, 7)]));

        // Every expected session is either observed or still flagged
        let expected: HashSet<NaiveDate> =
            calendar::expected_sessions(start, end).into_iter().collect();
        let observed: HashSet<NaiveDate> = observed.into_iter().collect();
        assert_eq!(
            expected,
            observed.union(&still_missing).copied().collect::<HashSet<_>>()
        );
    }
}
