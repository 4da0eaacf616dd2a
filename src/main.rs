//! Slotmarket - Main Entry Point
//!
//! Boots the promotion engine against Postgres (or an in-memory store for
//! local experiments) and waits for shutdown. Transport handlers attach to
//! the [`Engine`] from here.

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use slotmarket::config::load_config;
use slotmarket::store::{MemoryStore, PgStore};
use slotmarket::Engine;

/// CLI arguments for the application
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Run against the in-memory store instead of Postgres
    #[arg(long)]
    in_memory: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting slotmarket engine");
    info!("Configuration file: {}", args.config);

    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    let config = load_config(Some(&args.config))?;

    let _engine = if args.in_memory {
        warn!("Using the in-memory store; all state is lost on exit");
        Engine::with_store(MemoryStore::new())
    } else {
        let database = config
            .database
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("database configuration is required"))?;
        let store = PgStore::connect(database).await?;
        info!("Connected to Postgres");
        Engine::with_store(store)
    };

    info!("Engine initialized successfully");

    // Keep the application running until interrupted
    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal, cleaning up...");

    Ok(())
}
