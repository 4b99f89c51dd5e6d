//! Quality-issue commands

use anyhow::Result;
use clap::{Args, Subcommand};
use sqlx::postgres::PgPoolOptions;

use market_common::Severity;

use crate::config::Settings;
use crate::storage::QualityLogStore;

/// Issue subcommands
#[derive(Subcommand)]
pub enum IssuesCommands {
    /// View recent unresolved findings
    List(ListArgs),
    /// Mark a finding resolved
    Resolve(ResolveArgs),
}

/// Arguments for issues list
#[derive(Args)]
pub struct ListArgs {
    /// Only show findings for this symbol
    #[arg(long)]
    pub symbol: Option<String>,

    /// Days to look back
    #[arg(long, default_value = "7")]
    pub days: i64,

    /// Filter by severity (warning, error)
    #[arg(long)]
    pub severity: Option<String>,

    /// Only show findings with issues
    #[arg(long)]
    pub nonzero: bool,
}

/// Arguments for issues resolve
#[derive(Args)]
pub struct ResolveArgs {
    /// Finding id
    pub id: i32,
}

/// Execute issue commands
pub async fn execute(cmd: IssuesCommands) -> Result<()> {
    let settings = Settings::load().unwrap_or_else(|_| Settings::default_settings());
    let pool = PgPoolOptions::new()
        .max_connections(settings.database.max_connections)
        .connect(&settings.database.url)
        .await?;
    let store = QualityLogStore::new(pool);

    match cmd {
        IssuesCommands::List(args) => {
            let severity = match args.severity.as_deref() {
                Some(s) => Some(
                    Severity::from_str(s)
                        .ok_or_else(|| anyhow::anyhow!("unknown severity '{}'", s))?,
                ),
                None => None,
            };

            let findings = store
                .recent_findings(args.symbol.as_deref(), args.days, severity)
                .await?;

            let mut shown = 0;
            println!(
                "{:<6} {:<10} {:<14} {:<8} {:<7} CHECKED",
                "ID", "SYMBOL", "CHECK", "SEV", "ISSUES"
            );
            for finding in findings {
                if args.nonzero && finding.issue_count == 0 {
                    continue;
                }
                shown += 1;
                println!(
                    "{:<6} {:<10} {:<14} {:<8} {:<7} {}",
                    finding.id.unwrap_or(0),
                    finding.symbol,
                    finding.check_type,
                    finding.severity,
                    finding.issue_count,
                    finding.check_time.format("%Y-%m-%d %H:%M"),
                );
            }
            println!("\n{} finding(s)", shown);
        }
        IssuesCommands::Resolve(args) => {
            if store.resolve(args.id).await? {
                println!("Resolved finding {}", args.id);
            } else {
                println!("Finding {} not found or already resolved", args.id);
            }
        }
    }

    Ok(())
}
