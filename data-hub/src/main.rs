//! Data Hub CLI
//!
//! Provides commands for:
//! - `serve`: Start the scheduled maintenance service
//! - `run`: Run a single job (ingest, repair, actions, quality) now
//! - `symbol`: Symbol universe management
//! - `actions`: Corporate-actions queue
//! - `issues`: Quality findings
//! - `db`: Database operations

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use data_hub::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("data_hub=info".parse()?))
        .init();

    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Execute command
    match cli.command {
        Commands::Serve(args) => {
            data_hub::cli::serve::execute(args).await?;
        }
        Commands::Run(cmd) => {
            data_hub::cli::run::execute(cmd).await?;
        }
        Commands::Symbol(cmd) => {
            data_hub::cli::symbol::execute(cmd).await?;
        }
        Commands::Actions(cmd) => {
            data_hub::cli::actions::execute(cmd).await?;
        }
        Commands::Issues(cmd) => {
            data_hub::cli::issues::execute(cmd).await?;
        }
        Commands::Db(cmd) => {
            data_hub::cli::db::execute(cmd).await?;
        }
    }

    Ok(())
}
