use std::str::FromStr;

use anyhow::{bail, Context, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            other => bail!("STORE_BACKEND must be 'postgres' or 'memory', got '{other}'"),
        }
    }
}

/// Application configuration loaded from environment variables.
/// Fails at startup if a required variable is missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub store_backend: StoreBackend,
    /// Required for the postgres backend.
    pub database_url: Option<String>,
    /// Badge notifications are disabled when unset.
    pub redis_url: Option<String>,
    pub port: u16,
    pub rust_log: String,
    /// 0 disables the background rollup.
    pub rollup_interval_secs: u64,
    pub max_recompute_attempts: u32,
    pub leaderboard_max: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let store_backend: StoreBackend = env_or("STORE_BACKEND", "postgres")?;
        let database_url = std::env::var("DATABASE_URL").ok();
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            bail!("Required environment variable 'DATABASE_URL' is not set");
        }

        let max_recompute_attempts: u32 = env_or("MAX_RECOMPUTE_ATTEMPTS", "3")?;
        if max_recompute_attempts == 0 {
            bail!("MAX_RECOMPUTE_ATTEMPTS must be at least 1");
        }

        Ok(Config {
            store_backend,
            database_url,
            redis_url: std::env::var("REDIS_URL").ok(),
            port: env_or("PORT", "8080").context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            rollup_interval_secs: env_or("ROLLUP_INTERVAL_SECS", "3600")?,
            max_recompute_attempts,
            leaderboard_max: env_or("LEADERBOARD_MAX", "100")?,
        })
    }
}

fn env_or<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = std::env::var(key).unwrap_or_else(|_| default.to_string());
    raw.parse::<T>()
        .map_err(|e| anyhow::anyhow!("Invalid value '{raw}' for environment variable '{key}': {e}"))
}
