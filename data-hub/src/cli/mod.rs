//! Command-line interface
//!
//! Provides CLI commands for the data hub. `run` and `serve` funnel into
//! the same orchestrator paths, so a manual invocation behaves exactly
//! like a scheduled one.

pub mod actions;
pub mod db;
pub mod issues;
pub mod run;
pub mod serve;
pub mod symbol;

use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::actions::ActionTracker;
use crate::config::Settings;
use crate::ingest::IngestService;
use crate::jobs::{Lookbacks, Orchestrator};
use crate::provider::build_provider;
use crate::quality::QualityEngine;
use crate::repair::RepairService;
use crate::storage::{BarRepository, CorporateActionStore, QualityLogStore};
use crate::symbol::SymbolRegistry;

/// Data Hub CLI
#[derive(Parser)]
#[command(name = "data-hub")]
#[command(about = "EOD market-data maintenance: ingestion, repair, corporate actions, quality")]
#[command(version)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Start the scheduled maintenance service
    Serve(serve::ServeArgs),
    /// Run a single job now
    #[command(subcommand)]
    Run(run::RunCommands),
    /// Symbol universe management
    #[command(subcommand)]
    Symbol(symbol::SymbolCommands),
    /// Corporate-actions queue
    #[command(subcommand)]
    Actions(actions::ActionsCommands),
    /// Quality findings
    #[command(subcommand)]
    Issues(issues::IssuesCommands),
    /// Database operations
    #[command(subcommand)]
    Db(db::DbCommands),
}

/// Wires the service graph together from settings.
pub(crate) async fn build_orchestrator(
    settings: &Settings,
    shutdown: broadcast::Sender<()>,
) -> anyhow::Result<Orchestrator> {
    let repository = Arc::new(BarRepository::from_settings(&settings.database).await?);
    let pool = repository.pool().clone();

    let registry = Arc::new(SymbolRegistry::new(pool.clone()));
    let action_store = Arc::new(CorporateActionStore::new(pool.clone()));
    let quality_store = Arc::new(QualityLogStore::new(pool));

    let provider = build_provider(&settings.provider)?;
    let provider_timeout = std::time::Duration::from_secs(settings.provider.timeout_secs);

    let ingest = Arc::new(IngestService::new(
        provider.clone(),
        repository.clone(),
        provider_timeout,
        settings.ingestion.atomic_batch,
    ));
    let repair = Arc::new(RepairService::new(repository.clone(), ingest.clone()));
    let tracker = Arc::new(ActionTracker::new(provider, action_store, provider_timeout));
    let quality = Arc::new(QualityEngine::new(
        repository,
        quality_store,
        settings.quality.clone(),
    ));

    let lookbacks = Lookbacks {
        ingestion: settings.ingestion.lookback_days,
        repair: settings.repair.lookback_days,
        actions: settings.actions.lookback_days,
        quality: settings.quality.lookback_days,
    };

    Ok(Orchestrator::new(
        registry,
        ingest,
        repair,
        tracker,
        quality,
        settings.jobs.clone(),
        lookbacks,
        shutdown,
    ))
}
