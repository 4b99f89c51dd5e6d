//! Manual job invocation

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Args, Subcommand};
use tokio::sync::broadcast;

use crate::config::Settings;
use crate::jobs::JobSummary;

/// Run subcommands
#[derive(Subcommand)]
pub enum RunCommands {
    /// Ingest recent daily bars
    Ingest(IngestArgs),
    /// Detect and repair missing bars
    Repair(RepairArgs),
    /// Ingest corporate actions
    Actions(ActionsArgs),
    /// Run data-quality checks
    Quality(QualityArgs),
}

/// Arguments for the ingest job
#[derive(Args)]
pub struct IngestArgs {
    /// Symbols to process (default: all active symbols)
    #[arg(long, value_delimiter = ',')]
    pub symbols: Vec<String>,

    /// Range start (YYYY-MM-DD); requires --end
    #[arg(long, requires = "end")]
    pub start: Option<NaiveDate>,

    /// Range end (YYYY-MM-DD); requires --start
    #[arg(long, requires = "start")]
    pub end: Option<NaiveDate>,
}

/// Arguments for the repair job
#[derive(Args)]
pub struct RepairArgs {
    /// Symbols to process (default: all active symbols)
    #[arg(long, value_delimiter = ',')]
    pub symbols: Vec<String>,

    /// Days to look back for missing sessions
    #[arg(long)]
    pub lookback_days: Option<u32>,
}

/// Arguments for the corporate-actions job
#[derive(Args)]
pub struct ActionsArgs {
    /// Symbols to process (default: all active symbols)
    #[arg(long, value_delimiter = ',')]
    pub symbols: Vec<String>,

    /// Fetch events with ex-date on or after this date (YYYY-MM-DD)
    #[arg(long)]
    pub since: Option<NaiveDate>,
}

/// Arguments for the quality job
#[derive(Args)]
pub struct QualityArgs {
    /// Symbols to process (default: all active symbols)
    #[arg(long, value_delimiter = ',')]
    pub symbols: Vec<String>,

    /// Range start (YYYY-MM-DD); requires --end
    #[arg(long, requires = "end")]
    pub start: Option<NaiveDate>,

    /// Range end (YYYY-MM-DD); requires --start
    #[arg(long, requires = "start")]
    pub end: Option<NaiveDate>,
}

/// Execute run commands
pub async fn execute(cmd: RunCommands) -> Result<()> {
    let settings = Settings::load().unwrap_or_else(|_| Settings::default_settings());
    // Manual runs have no serve loop; the shutdown channel never fires
    let (shutdown, _) = broadcast::channel(1);
    let orchestrator = super::build_orchestrator(&settings, shutdown).await?;

    let summary = match cmd {
        RunCommands::Ingest(args) => {
            let range = args.start.zip(args.end);
            orchestrator
                .run_ingestion(symbols_arg(args.symbols), range)
                .await?
        }
        RunCommands::Repair(args) => {
            orchestrator
                .run_repair(symbols_arg(args.symbols), args.lookback_days)
                .await?
        }
        RunCommands::Actions(args) => {
            orchestrator
                .run_corporate_actions(symbols_arg(args.symbols), args.since)
                .await?
        }
        RunCommands::Quality(args) => {
            let range = args.start.zip(args.end);
            orchestrator
                .run_quality_checks(symbols_arg(args.symbols), range)
                .await?
        }
    };

    print_summary(&summary);
    Ok(())
}

fn symbols_arg(symbols: Vec<String>) -> Option<Vec<String>> {
    if symbols.is_empty() {
        None
    } else {
        Some(symbols)
    }
}

fn print_summary(summary: &JobSummary) {
    println!(
        "\n{} job {} finished in {:.1}s",
        summary.kind,
        summary.id,
        (summary.finished_at - summary.started_at).num_milliseconds() as f64 / 1000.0
    );
    println!(
        "  symbols: {} ok, {} failed, {} records",
        summary.succeeded(),
        summary.failed(),
        summary.total_records()
    );
    if summary.cancelled {
        println!("  job was cancelled before completing the symbol set");
    }

    for report in &summary.results {
        match &report.error {
            Some(error) => println!("  {:<8} FAILED: {}", report.symbol, error),
            None => println!("  {:<8} {} records", report.symbol, report.records),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_symbol_list_means_active_set() {
        assert_eq!(symbols_arg(vec![]), None);
        assert_eq!(
            symbols_arg(vec!["AAPL".to_string()]),
            Some(vec!["AAPL".to_string()])
        );
    }
}
