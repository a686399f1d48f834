//! Service configuration
//!
//! Loaded from an optional TOML file; every field has a default so an empty
//! file (or no file) is valid. CLI flags and environment variables override
//! file values in `main`.

use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use article_server::PoolConfig;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSection,
    pub database: DatabaseSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub bind: SocketAddr,
    pub cors_permissive: bool,
    /// Per-request deadline for database work; 0 disables it
    pub request_timeout_secs: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 3030)),
            cors_permissive: false,
            request_timeout_secs: 30,
        }
    }
}

impl ServerSection {
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    pub url: Option<String>,
    pub run_migrations: bool,
    #[serde(flatten)]
    pub pool: PoolConfig,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            url: None,
            run_migrations: true,
            pool: PoolConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from `path`, or defaults when no path is given.
    ///
    /// Fails hard with an actionable error if an explicit path is missing.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        if !path.exists() {
            anyhow::bail!(
                "Config not found at {:?}\n\nCreate it or drop --config to use defaults",
                path
            );
        }

        let content = fs::read_to_string(path)
            .context(format!("Failed to read config file: {:?}", path))?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config file (invalid TOML)")
    }
}
