//! CLI parser and command dispatch.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::Settings;
use crate::models::MarketplaceId;

#[derive(Parser)]
#[command(name = "pricewatch")]
#[command(about = "Multi-marketplace price and review acquisition pipeline")]
#[command(version)]
pub struct Cli {
    /// Config file path (default: pricewatch.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the offer store path
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scrape pipeline over tracked products
    Scrape {
        /// Only products that have never produced an offer
        #[arg(long)]
        new_only: bool,

        /// Restrict the run to a single product id
        #[arg(long)]
        product: Option<String>,

        /// Pre-check the aggregator listing and skip absent marketplaces
        #[arg(long)]
        available_only: bool,

        /// Marketplaces to scrape (default: all)
        #[arg(long, value_delimiter = ',')]
        sites: Vec<MarketplaceId>,
    },

    /// Internal: execute one scrape task from its JSON payload
    #[command(name = "run-task", hide = true)]
    RunTask {
        /// The task as a JSON object
        payload: String,
    },

    /// Discover products from aggregator category pages
    Discover {
        /// Products to take per category page
        #[arg(long, default_value_t = 34)]
        per_category: usize,
    },

    /// Manage tracked products
    Targets {
        #[command(subcommand)]
        command: TargetsCommands,
    },

    /// Serve the analytics/chat JSON API
    Serve {
        /// Bind address override (default from config)
        #[arg(long)]
        bind: Option<String>,
    },
}

#[derive(Subcommand)]
enum TargetsCommands {
    /// Add a product to the targets file
    Add {
        product_id: String,
        product_name: String,
        category: String,
        url: String,
    },
    /// List tracked products
    List,
    /// Mirror the targets file into the store
    Sync,
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        settings.database_path = db;
    }

    match cli.command {
        Commands::Scrape {
            new_only,
            product,
            available_only,
            sites,
        } => {
            commands::scrape::run(
                &settings,
                cli.config.clone(),
                new_only,
                product,
                available_only,
                sites,
            )
            .await
        }
        Commands::RunTask { payload } => commands::run_task::run(&settings, &payload).await,
        Commands::Discover { per_category } => {
            commands::discover::run(&settings, per_category).await
        }
        Commands::Targets { command } => match command {
            TargetsCommands::Add {
                product_id,
                product_name,
                category,
                url,
            } => commands::targets::add(&settings, &product_id, &product_name, &category, &url),
            TargetsCommands::List => commands::targets::list(&settings),
            TargetsCommands::Sync => commands::targets::sync(&settings),
        },
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                settings.server.bind = bind;
            }
            crate::server::serve(settings).await
        }
    }
}
