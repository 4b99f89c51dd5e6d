//! Corporate-actions queue commands

use anyhow::Result;
use clap::{Args, Subcommand};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;

use crate::config::Settings;
use crate::storage::CorporateActionStore;

/// Corporate-actions subcommands
#[derive(Subcommand)]
pub enum ActionsCommands {
    /// List unprocessed split/dividend events
    List(ListArgs),
    /// Hand an event off to the adjustment consumer
    MarkProcessed(MarkProcessedArgs),
}

/// Arguments for actions list
#[derive(Args)]
pub struct ListArgs {
    /// Only show events for this symbol
    #[arg(long)]
    pub symbol: Option<String>,
}

/// Arguments for mark-processed
#[derive(Args)]
pub struct MarkProcessedArgs {
    /// Event id
    pub id: i32,
}

/// Execute actions commands
pub async fn execute(cmd: ActionsCommands) -> Result<()> {
    let settings = Settings::load().unwrap_or_else(|_| Settings::default_settings());
    let pool = PgPoolOptions::new()
        .max_connections(settings.database.max_connections)
        .connect(&settings.database.url)
        .await?;
    let store = Arc::new(CorporateActionStore::new(pool));

    match cmd {
        ActionsCommands::List(args) => {
            let actions = store.list_unprocessed(args.symbol.as_deref()).await?;

            if actions.is_empty() {
                println!("No unprocessed corporate actions");
                return Ok(());
            }

            println!("{:<6} {:<10} {:<10} {:<12} VALUE", "ID", "SYMBOL", "TYPE", "EX-DATE");
            for action in actions {
                let value = match action.action_type {
                    market_common::ActionType::Split => action
                        .split_ratio
                        .map(|r| format!("{}:1", r))
                        .unwrap_or_else(|| "-".to_string()),
                    market_common::ActionType::Dividend => action
                        .dividend_amount
                        .map(|a| format!("{}/share", a))
                        .unwrap_or_else(|| "-".to_string()),
                };
                println!(
                    "{:<6} {:<10} {:<10} {:<12} {}",
                    action.id.unwrap_or(0),
                    action.symbol,
                    action.action_type,
                    action.ex_date,
                    value,
                );
            }
        }
        ActionsCommands::MarkProcessed(args) => {
            if store.mark_processed(args.id).await? {
                println!("Marked action {} processed", args.id);
            } else {
                println!("Action {} not found or already processed", args.id);
            }
        }
    }

    Ok(())
}
