//! Configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::repository::{DEFAULT_PER_PAGE, MAX_PER_PAGE};

/// Runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection URL.
    pub database_url: String,

    /// Maximum database connections in pool (default: 10).
    pub database_max_connections: u32,

    /// Per-statement timeout for reads (default: 10s).
    pub statement_timeout: Duration,

    /// Page size used when none is requested (default: 15).
    pub default_per_page: u32,

    /// Upper bound for requested page sizes (default: 100).
    pub max_per_page: u32,

    /// Optional criteria declaration file (JSON or YAML).
    pub criteria_file: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let database_url =
            env::var("DATABASE_URL").context("DATABASE_URL environment variable is required")?;

        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .context("DATABASE_MAX_CONNECTIONS must be a valid u32")?;

        let statement_timeout = env::var("STATEMENT_TIMEOUT_SECS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .map(Duration::from_secs)
            .context("STATEMENT_TIMEOUT_SECS must be a valid u64")?;

        let default_per_page = env::var("DEFAULT_PER_PAGE")
            .unwrap_or_else(|_| DEFAULT_PER_PAGE.to_string())
            .parse()
            .context("DEFAULT_PER_PAGE must be a valid u32")?;

        let max_per_page = env::var("MAX_PER_PAGE")
            .unwrap_or_else(|_| MAX_PER_PAGE.to_string())
            .parse()
            .context("MAX_PER_PAGE must be a valid u32")?;

        let criteria_file = env::var("CRITERIA_FILE")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            database_url,
            database_max_connections,
            statement_timeout,
            default_per_page,
            max_per_page,
            criteria_file,
        })
    }
}
