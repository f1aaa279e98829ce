mod collect;
mod fmv;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use bikefmv_core::MarketStore;
use bikefmv_db::{PgMarketStore, PoolConfig};

use crate::collect::CollectCommands;
use crate::fmv::FmvCommands;

#[derive(Debug, Parser)]
#[command(name = "bikefmv")]
#[command(about = "Secondhand bike market collection and fair market value estimation")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Plan and run listing collection
    Collect {
        #[command(subcommand)]
        command: CollectCommands,
    },
    /// Fair market value lookups
    Fmv {
        #[command(subcommand)]
        command: FmvCommands,
    },
    /// Summarize stored market history
    Stats,
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Check database connectivity
    Ping,
    /// Apply pending migrations
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = bikefmv_core::load_app_config_from_env()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
    tracing::debug!(env = %config.env, "configuration loaded");

    match cli.command {
        Some(Commands::Db { command }) => run_db(&config, command).await?,
        Some(Commands::Collect { command }) => collect::run(&config, command).await?,
        Some(Commands::Fmv { command }) => fmv::run(&config, command).await?,
        Some(Commands::Stats) => run_stats(&config).await?,
        None => println!("bikefmv: run with --help for available commands"),
    }

    Ok(())
}

/// Opens the market store (applying migrations) for commands that need it.
pub(crate) async fn connect_store(config: &bikefmv_core::AppConfig) -> anyhow::Result<PgMarketStore> {
    let database_url = config.require_database_url()?;
    let store = PgMarketStore::connect(database_url, PoolConfig::from_app_config(config)).await?;
    Ok(store)
}

async fn run_db(config: &bikefmv_core::AppConfig, command: DbCommands) -> anyhow::Result<()> {
    let database_url = config.require_database_url()?;
    let pool = bikefmv_db::connect_pool(database_url, PoolConfig::from_app_config(config)).await?;
    match command {
        DbCommands::Ping => {
            bikefmv_db::ping(&pool).await?;
            println!("database ok");
        }
        DbCommands::Migrate => {
            let applied = bikefmv_db::run_migrations(&pool).await?;
            println!("migrations applied ({applied} total)");
        }
    }
    pool.close().await;
    Ok(())
}

async fn run_stats(config: &bikefmv_core::AppConfig) -> anyhow::Result<()> {
    let store = connect_store(config).await?;
    let stats = store.market_stats().await?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    store.close().await;
    Ok(())
}
