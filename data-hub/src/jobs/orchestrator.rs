//! Job orchestrator
//!
//! Runs one job kind at a time over the active symbol set. Per-symbol work
//! fans out across a bounded worker pool; a symbol's failure is caught,
//! logged with its range, retried when transient, and recorded in the
//! summary; it never aborts the batch. Cancellation is cooperative: the
//! shutdown signal is checked between symbols, so the current symbol
//! finishes and no new one starts.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, Semaphore};
use tracing::{error, info, warn};
use uuid::Uuid;

use market_common::{ErrorCategory, ErrorClassification};

use crate::actions::{ActionTracker, ActionsError};
use crate::config::JobsSettings;
use crate::ingest::{IngestError, IngestService};
use crate::quality::QualityEngine;
use crate::repair::RepairService;
use crate::storage::RepositoryError;
use crate::symbol::SymbolRegistry;

/// Kind of maintenance job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    Ingestion,
    Repair,
    CorporateActions,
    Quality,
}

impl JobKind {
    /// Every kind, in scheduled execution order
    pub const ALL: [JobKind; 4] = [
        JobKind::Ingestion,
        JobKind::Repair,
        JobKind::CorporateActions,
        JobKind::Quality,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Ingestion => "ingestion",
            JobKind::Repair => "repair",
            JobKind::CorporateActions => "corporate_actions",
            JobKind::Quality => "quality",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ingestion" => Some(JobKind::Ingestion),
            "repair" => Some(JobKind::Repair),
            "corporate_actions" => Some(JobKind::CorporateActions),
            "quality" => Some(JobKind::Quality),
            _ => None,
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-symbol failure inside a job
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum JobError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Actions(#[from] ActionsError),
}

impl ErrorClassification for JobError {
    fn category(&self) -> ErrorCategory {
        match self {
            JobError::Ingest(e) => e.category(),
            JobError::Actions(e) => e.category(),
        }
    }

    fn suggested_retry_delay(&self) -> Option<std::time::Duration> {
        match self {
            JobError::Ingest(e) => e.suggested_retry_delay(),
            JobError::Actions(e) => e.suggested_retry_delay(),
        }
    }
}

/// Orchestrator-level failures (not per-symbol)
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum OrchestratorError {
    #[error("{requested} requested while {running} is still running")]
    Busy {
        running: JobKind,
        requested: JobKind,
    },

    #[error("Symbol registry error: {0}")]
    Registry(#[from] RepositoryError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Outcome for one symbol within a job
#[derive(Debug, Clone)]
pub struct SymbolReport {
    pub symbol: String,
    /// Records handled: bars written, actions stored, or findings logged
    pub records: u64,
    /// Error message when the symbol failed after retries
    pub error: Option<String>,
}

/// Summary of one job execution
#[derive(Debug, Clone)]
pub struct JobSummary {
    pub id: Uuid,
    pub kind: JobKind,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub results: Vec<SymbolReport>,
    /// True when cooperative cancellation stopped the job early
    pub cancelled: bool,
}

impl JobSummary {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.error.is_none()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| r.error.is_some()).count()
    }

    pub fn total_records(&self) -> u64 {
        self.results.iter().map(|r| r.records).sum()
    }
}

/// Per-symbol work definition for one job execution
#[derive(Debug, Clone, Copy)]
enum JobSpec {
    Ingestion { start: NaiveDate, end: NaiveDate },
    Repair { start: NaiveDate, end: NaiveDate },
    Actions { since: NaiveDate },
    Quality { start: NaiveDate, end: NaiveDate },
}

/// Services a job executes against
#[derive(Clone)]
struct JobContext {
    ingest: Arc<IngestService>,
    repair: Arc<RepairService>,
    tracker: Arc<ActionTracker>,
    quality: Arc<QualityEngine>,
}

/// Job orchestrator
pub struct Orchestrator {
    registry: Arc<SymbolRegistry>,
    context: JobContext,
    settings: JobsSettings,
    lookbacks: Lookbacks,
    /// One job kind active at a time
    active: Arc<Mutex<Option<JobKind>>>,
    shutdown: broadcast::Sender<()>,
}

/// Default lookback windows per job kind, in days
#[derive(Debug, Clone, Copy)]
pub struct Lookbacks {
    pub ingestion: u32,
    pub repair: u32,
    pub actions: u32,
    pub quality: u32,
}

impl Orchestrator {
    /// Create a new orchestrator
    pub fn new(
        registry: Arc<SymbolRegistry>,
        ingest: Arc<IngestService>,
        repair: Arc<RepairService>,
        tracker: Arc<ActionTracker>,
        quality: Arc<QualityEngine>,
        settings: JobsSettings,
        lookbacks: Lookbacks,
        shutdown: broadcast::Sender<()>,
    ) -> Self {
        Self {
            registry,
            context: JobContext {
                ingest,
                repair,
                tracker,
                quality,
            },
            settings,
            lookbacks,
            active: Arc::new(Mutex::new(None)),
            shutdown,
        }
    }

    /// Ingest recent bars for the given symbols (default: active set) over
    /// the given range (default: the configured ingestion lookback).
    pub async fn run_ingestion(
        &self,
        symbols: Option<Vec<String>>,
        range: Option<(NaiveDate, NaiveDate)>,
    ) -> Result<JobSummary, OrchestratorError> {
        let (start, end) = range.unwrap_or_else(|| lookback_range(self.lookbacks.ingestion));
        self.run_job(JobKind::Ingestion, symbols, JobSpec::Ingestion { start, end })
            .await
    }

    /// Detect and repair gaps over the lookback window.
    pub async fn run_repair(
        &self,
        symbols: Option<Vec<String>>,
        lookback_days: Option<u32>,
    ) -> Result<JobSummary, OrchestratorError> {
        let (start, end) = lookback_range(lookback_days.unwrap_or(self.lookbacks.repair));
        self.run_job(JobKind::Repair, symbols, JobSpec::Repair { start, end })
            .await
    }

    /// Ingest corporate actions since the lookback date.
    pub async fn run_corporate_actions(
        &self,
        symbols: Option<Vec<String>>,
        since: Option<NaiveDate>,
    ) -> Result<JobSummary, OrchestratorError> {
        let since = since.unwrap_or_else(|| lookback_range(self.lookbacks.actions).0);
        self.run_job(JobKind::CorporateActions, symbols, JobSpec::Actions { since })
            .await
    }

    /// Run all quality checks over the given range (default: the
    /// configured quality lookback).
    pub async fn run_quality_checks(
        &self,
        symbols: Option<Vec<String>>,
        range: Option<(NaiveDate, NaiveDate)>,
    ) -> Result<JobSummary, OrchestratorError> {
        let (start, end) = range.unwrap_or_else(|| lookback_range(self.lookbacks.quality));
        self.run_job(JobKind::Quality, symbols, JobSpec::Quality { start, end })
            .await
    }

    /// Run a job kind immediately with its default parameters.
    ///
    /// Scheduled and manual invocations both land here, so behavior is
    /// identical no matter who triggered the job.
    pub async fn run_now(&self, kind: JobKind) -> Result<JobSummary, OrchestratorError> {
        match kind {
            JobKind::Ingestion => self.run_ingestion(None, None).await,
            JobKind::Repair => self.run_repair(None, None).await,
            JobKind::CorporateActions => self.run_corporate_actions(None, None).await,
            JobKind::Quality => self.run_quality_checks(None, None).await,
        }
    }

    async fn run_job(
        &self,
        kind: JobKind,
        symbols: Option<Vec<String>>,
        spec: JobSpec,
    ) -> Result<JobSummary, OrchestratorError> {
        let _guard = self.acquire(kind)?;
        let started_at = Utc::now();
        let id = Uuid::new_v4();

        let symbols = match symbols {
            Some(symbols) => symbols,
            None => self.registry.active_symbols().await?,
        };

        if symbols.is_empty() {
            warn!(job = %kind, "no symbols to process");
            return Ok(JobSummary {
                id,
                kind,
                started_at,
                finished_at: Utc::now(),
                results: Vec::new(),
                cancelled: false,
            });
        }

        info!(job = %kind, symbols = symbols.len(), %id, "starting job");

        let semaphore = Arc::new(Semaphore::new(self.settings.max_concurrent_symbols.max(1)));
        let mut shutdown_rx = self.shutdown.subscribe();
        let mut handles = Vec::with_capacity(symbols.len());
        let mut cancelled = false;

        for symbol in symbols {
            // Cooperative cancellation: finish in-flight symbols, start no
            // new ones
            match shutdown_rx.try_recv() {
                Err(broadcast::error::TryRecvError::Empty) => {}
                _ => {
                    info!(job = %kind, "shutdown requested, stopping before next symbol");
                    cancelled = true;
                    break;
                }
            }

            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| OrchestratorError::Internal(e.to_string()))?;
            let context = self.context.clone();
            let max_retries = self.settings.max_retries;

            handles.push(tokio::spawn(async move {
                let _permit = permit;
                match run_symbol(&context, &symbol, spec, max_retries).await {
                    Ok(records) => SymbolReport {
                        symbol,
                        records,
                        error: None,
                    },
                    Err(e) => {
                        error!(%symbol, job_spec = ?spec, error = %e, "symbol failed");
                        SymbolReport {
                            symbol,
                            records: 0,
                            error: Some(e.to_string()),
                        }
                    }
                }
            }));
        }

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(report) => results.push(report),
                Err(e) => return Err(OrchestratorError::Internal(e.to_string())),
            }
        }

        let summary = JobSummary {
            id,
            kind,
            started_at,
            finished_at: Utc::now(),
            results,
            cancelled,
        };

        info!(
            job = %kind,
            succeeded = summary.succeeded(),
            failed = summary.failed(),
            records = summary.total_records(),
            cancelled = summary.cancelled,
            "job finished"
        );

        Ok(summary)
    }

    fn acquire(&self, kind: JobKind) -> Result<ActiveJobGuard, OrchestratorError> {
        let mut active = self.active.lock();
        if let Some(running) = *active {
            return Err(OrchestratorError::Busy {
                running,
                requested: kind,
            });
        }
        *active = Some(kind);
        Ok(ActiveJobGuard {
            slot: self.active.clone(),
        })
    }
}

/// Clears the active-job slot when the job ends, success or not
struct ActiveJobGuard {
    slot: Arc<Mutex<Option<JobKind>>>,
}

impl Drop for ActiveJobGuard {
    fn drop(&mut self) {
        *self.slot.lock() = None;
    }
}

/// `[today - days, today]`
fn lookback_range(days: u32) -> (NaiveDate, NaiveDate) {
    let end = Utc::now().date_naive();
    (end - Duration::days(days as i64), end)
}

async fn run_symbol(
    context: &JobContext,
    symbol: &str,
    spec: JobSpec,
    max_retries: u32,
) -> Result<u64, JobError> {
    let mut attempt = 0;
    loop {
        match execute(context, symbol, spec).await {
            Ok(records) => return Ok(records),
            Err(e) if e.is_retryable() && attempt < max_retries => {
                let delay = e
                    .suggested_retry_delay()
                    .unwrap_or(std::time::Duration::from_millis(500));
                warn!(
                    %symbol,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "transient failure, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

async fn execute(context: &JobContext, symbol: &str, spec: JobSpec) -> Result<u64, JobError> {
    match spec {
        JobSpec::Ingestion { start, end } => {
            let report = context.ingest.ingest_range(symbol, start, end).await?;
            Ok(report.written as u64)
        }
        JobSpec::Repair { start, end } => {
            let report = context.repair.repair_range(symbol, start, end).await?;
            Ok(report.written as u64)
        }
        JobSpec::Actions { since } => {
            let stored = context.tracker.ingest_actions(symbol, since).await?;
            Ok(stored as u64)
        }
        JobSpec::Quality { start, end } => {
            let run = context.quality.run_all_checks(symbol, start, end).await;
            if !run.failures.is_empty() {
                for failure in &run.failures {
                    warn!(%symbol, check = %failure.check_type, error = %failure.error, "check did not complete");
                }
            }
            Ok(run.findings.len() as u64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_kind_round_trip() {
        for kind in JobKind::ALL {
            assert_eq!(JobKind::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(JobKind::from_str("compaction"), None);
    }

    #[test]
    fn test_job_kind_order_matches_schedule() {
        assert_eq!(
            JobKind::ALL,
            [
                JobKind::Ingestion,
                JobKind::Repair,
                JobKind::CorporateActions,
                JobKind::Quality,
            ]
        );
    }

    #[test]
    fn test_summary_aggregation() {
        let summary = JobSummary {
            id: Uuid::new_v4(),
            kind: JobKind::Ingestion,
            started_at: Utc::now(),
            finished_at: Utc::now(),
            results: vec![
                SymbolReport {
                    symbol: "AAPL".to_string(),
                    records: 5,
                    error: None,
                },
                SymbolReport {
                    symbol: "MSFT".to_string(),
                    records: 0,
                    error: Some("Connection error: refused".to_string()),
                },
                SymbolReport {
                    symbol: "SPY".to_string(),
                    records: 3,
                    error: None,
                },
            ],
            cancelled: false,
        };

        assert_eq!(summary.succeeded(), 2);
        assert_eq!(summary.failed(), 1);
        assert_eq!(summary.total_records(), 8);
    }

    #[test]
    fn test_lookback_range_spans_requested_days() {
        let (start, end) = lookback_range(30);
        assert_eq!((end - start).num_days(), 30);
    }

    #[test]
    fn test_active_guard_clears_on_drop() {
        let slot: Arc<Mutex<Option<JobKind>>> = Arc::new(Mutex::new(Some(JobKind::Repair)));
        {
            let _guard = ActiveJobGuard { slot: slot.clone() };
        }
        assert!(slot.lock().is_none());
    }
}
