//! Symbol management commands

use anyhow::Result;
use clap::{Args, Subcommand};
use sqlx::postgres::PgPoolOptions;

use crate::config::Settings;
use crate::symbol::{AssetType, NewSymbol, SymbolRegistry};

/// Symbol subcommands
#[derive(Subcommand)]
pub enum SymbolCommands {
    /// Register a symbol (or refresh its metadata)
    Add(AddArgs),
    /// List registered symbols
    List(ListArgs),
    /// Mark a symbol active
    Activate(ToggleArgs),
    /// Mark a symbol inactive (it is never deleted)
    Deactivate(ToggleArgs),
}

/// Arguments for symbol add
#[derive(Args)]
pub struct AddArgs {
    /// Ticker symbol
    pub symbol: String,

    /// Company or asset name
    #[arg(long)]
    pub name: Option<String>,

    /// Exchange where traded
    #[arg(long)]
    pub exchange: Option<String>,

    /// Asset type (equity, etf, index, fund)
    #[arg(long, default_value = "equity")]
    pub asset_type: String,

    /// Sector classification
    #[arg(long)]
    pub sector: Option<String>,

    /// Industry classification
    #[arg(long)]
    pub industry: Option<String>,

    /// Data source identifier
    #[arg(long, default_value = "yahoo")]
    pub data_source: String,
}

/// Arguments for symbol list
#[derive(Args)]
pub struct ListArgs {
    /// Include inactive symbols
    #[arg(long)]
    pub all: bool,
}

/// Arguments for activate/deactivate
#[derive(Args)]
pub struct ToggleArgs {
    /// Ticker symbol
    pub symbol: String,
}

/// Execute symbol commands
pub async fn execute(cmd: SymbolCommands) -> Result<()> {
    let settings = Settings::load().unwrap_or_else(|_| Settings::default_settings());
    let pool = PgPoolOptions::new()
        .max_connections(settings.database.max_connections)
        .connect(&settings.database.url)
        .await?;
    let registry = SymbolRegistry::new(pool);

    match cmd {
        SymbolCommands::Add(args) => {
            let asset_type = AssetType::from_str(&args.asset_type)
                .ok_or_else(|| anyhow::anyhow!("unknown asset type '{}'", args.asset_type))?;

            let mut new = NewSymbol::new(&args.symbol).with_asset_type(asset_type);
            new.name = args.name;
            new.exchange = args.exchange;
            new.sector = args.sector;
            new.industry = args.industry;
            new.data_source = args.data_source;

            let id = registry.register(&new).await?;
            println!("Registered {} (id {})", args.symbol, id);
        }
        SymbolCommands::List(args) => {
            let symbols = registry.list().await?;
            let total = symbols.len();
            let mut shown = 0;

            println!(
                "{:<10} {:<8} {:<10} {:<8} NAME",
                "SYMBOL", "TYPE", "EXCHANGE", "ACTIVE"
            );
            for symbol in symbols {
                if !args.all && !symbol.is_active {
                    continue;
                }
                shown += 1;
                println!(
                    "{:<10} {:<8} {:<10} {:<8} {}",
                    symbol.symbol,
                    symbol.asset_type.as_str(),
                    symbol.exchange.as_deref().unwrap_or("-"),
                    symbol.is_active,
                    symbol.name.as_deref().unwrap_or("-"),
                );
            }
            println!("\n{} shown, {} registered", shown, total);
        }
        SymbolCommands::Activate(args) => {
            if registry.set_active(&args.symbol, true).await? {
                println!("Activated {}", args.symbol);
            } else {
                println!("Symbol {} is not registered", args.symbol);
            }
        }
        SymbolCommands::Deactivate(args) => {
            if registry.set_active(&args.symbol, false).await? {
                println!("Deactivated {}", args.symbol);
            } else {
                println!("Symbol {} is not registered", args.symbol);
            }
        }
    }

    Ok(())
}
