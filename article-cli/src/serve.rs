//! `serve` and `migrate` commands

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use article_server::db::migrations;
use article_server::http::{run_server, ServerConfig};
use article_server::{ArticleService, DisabledSearch, PgClient};

use crate::config::AppConfig;

/// Arguments for the serve command
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Address to bind to (overrides [server] bind)
    #[arg(long, short = 'b')]
    pub bind: Option<SocketAddr>,

    /// Allow permissive CORS (all origins) - use with caution
    #[arg(long)]
    pub cors_permissive: bool,

    /// Skip schema migrations at startup
    #[arg(long)]
    pub skip_migrations: bool,
}

fn database_url(config: &AppConfig, flag: Option<String>) -> Result<String> {
    flag.or_else(|| config.database.url.clone())
        .context("DATABASE_URL not set. Set via --database-url, DATABASE_URL env, .env, or [database] url")
}

async fn connect(config: &AppConfig, url: &str) -> Result<PgClient> {
    PgClient::connect(url, &config.database.pool)
        .await
        .context("Failed to create database pool")
}

/// Run the HTTP server
pub async fn run_serve(args: ServeArgs, config: AppConfig, url: Option<String>) -> Result<()> {
    let url = database_url(&config, url)?;
    let client = connect(&config, &url).await?;

    if config.database.run_migrations && !args.skip_migrations {
        migrations::run(client.pool())
            .await
            .context("Failed to run migrations")?;
    }

    let server_config = ServerConfig {
        bind_addr: args.bind.unwrap_or(config.server.bind),
        cors_permissive: args.cors_permissive || config.server.cors_permissive,
        request_timeout: config.server.request_timeout(),
    };
    tracing::info!("Starting article service on {}", server_config.bind_addr);

    let client = Arc::new(client);
    let service = ArticleService::new(client.clone(), Arc::new(DisabledSearch));

    // Run server (blocks until shutdown)
    let result = run_server(service, server_config).await;
    client.close().await;
    result.context("Server error")
}

/// Apply schema migrations and exit
pub async fn run_migrate(config: AppConfig, url: Option<String>) -> Result<()> {
    let url = database_url(&config, url)?;
    let client = connect(&config, &url).await?;

    let result = migrations::run(client.pool()).await;
    client.close().await;
    result.context("Failed to run migrations")
}
