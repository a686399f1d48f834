//! article-service - HTTP front end for the article store
//!
//! Subcommands:
//! - `serve`: run migrations (unless disabled) and serve the HTTP API
//! - `migrate`: apply schema migrations and exit

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod config;
mod serve;
mod tracing_setup;

use config::AppConfig;
use tracing_setup::TracingConfig;

#[derive(Parser, Debug)]
#[command(
    name = "article-service",
    author,
    version,
    about = "Article service with transaction-aware Postgres storage"
)]
struct Cli {
    /// Path to a TOML config file ([server] and [database] sections)
    #[arg(long, short = 'c', global = true, env = "ARTICLE_CONFIG")]
    config: Option<PathBuf>,

    /// Database URL (overrides config file)
    #[arg(long, global = true, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP API server
    Serve(serve::ServeArgs),
    /// Apply schema migrations and exit
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional; real environment variables win
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    tracing_setup::init(&TracingConfig { debug: cli.debug })?;

    let config = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve(args) => serve::run_serve(args, config, cli.database_url).await?,
        Commands::Migrate => serve::run_migrate(config, cli.database_url).await?,
    }
    Ok(())
}
