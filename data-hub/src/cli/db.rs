//! Database management commands

use anyhow::Result;
use clap::{Args, Subcommand};
use tracing::info;

use crate::config::Settings;
use crate::storage::{BarRepository, TimescaleOperations};

/// Database subcommands
#[derive(Subcommand)]
pub enum DbCommands {
    /// Run database migrations
    Migrate(MigrateArgs),
    /// Show bar-store statistics
    Stats(StatsArgs),
}

/// Arguments for migrate command
#[derive(Args)]
pub struct MigrateArgs {
    /// Enable compression after migration
    #[arg(long)]
    pub enable_compression: bool,

    /// Compress chunks older than N days
    #[arg(long, default_value = "90")]
    pub compress_after_days: i32,
}

/// Arguments for stats command
#[derive(Args)]
pub struct StatsArgs {
    /// Show per-symbol statistics
    #[arg(long, short)]
    pub verbose: bool,
}

/// Execute database commands
pub async fn execute(cmd: DbCommands) -> Result<()> {
    match cmd {
        DbCommands::Migrate(args) => execute_migrate(args).await,
        DbCommands::Stats(args) => execute_stats(args).await,
    }
}

async fn execute_migrate(args: MigrateArgs) -> Result<()> {
    let settings = Settings::load().unwrap_or_else(|_| Settings::default_settings());
    let repository = BarRepository::from_settings(&settings.database).await?;
    let timescale = TimescaleOperations::new(repository.pool().clone());

    info!("Running migrations...");
    timescale.run_migrations().await?;

    if args.enable_compression {
        info!("Enabling compression...");
        timescale.enable_compression().await?;
        timescale
            .add_compression_policy(args.compress_after_days)
            .await?;
    }

    info!("Migrations completed");
    Ok(())
}

async fn execute_stats(args: StatsArgs) -> Result<()> {
    let settings = Settings::load().unwrap_or_else(|_| Settings::default_settings());
    let repository = BarRepository::from_settings(&settings.database).await?;

    let stats = repository.store_stats().await?;

    println!("Bar store statistics:");
    println!("  Total bars:    {}", stats.total_bars);
    println!("  Total symbols: {}", stats.total_symbols);
    println!("  Total size:    {}", stats.total_size);
    if let Some(first) = stats.first_session {
        println!("  First session:  {}", first);
    }
    if let Some(latest) = stats.latest_session {
        println!("  Latest session: {}", latest);
    }

    if args.verbose {
        use crate::symbol::SymbolRegistry;
        let registry = SymbolRegistry::new(repository.pool().clone());

        println!("\nPer-symbol statistics:");
        for symbol in registry.list().await? {
            let sym_stats = repository.symbol_stats(&symbol.symbol).await?;
            println!(
                "  {:<10} {:>8} bars ({} - {})",
                sym_stats.symbol,
                sym_stats.bar_count,
                sym_stats
                    .first_session
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                sym_stats
                    .latest_session
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "-".to_string()),
            );
        }
    }

    Ok(())
}
