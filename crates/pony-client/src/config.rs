use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_STORE_PATH: &str = "pony.db";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Client settings, read from `PONY_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_url: String,
    pub store_path: PathBuf,
    pub request_timeout: Duration,
    /// Fresh entries older than this are refetched on the next read.
    pub stale_after: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.into(),
            store_path: PathBuf::from(DEFAULT_STORE_PATH),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            stale_after: None,
        }
    }
}

impl ClientConfig {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source. Unset or blank variables take their
    /// defaults; set but unparseable numbers are an error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let request_timeout = match var("PONY_REQUEST_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(raw.parse().context("PONY_REQUEST_TIMEOUT_SECS must be a number of seconds")?),
            None => defaults.request_timeout,
        };

        let stale_after = var("PONY_STALE_AFTER_SECS")
            .map(|raw| raw.parse().map(Duration::from_secs))
            .transpose()
            .context("PONY_STALE_AFTER_SECS must be a number of seconds")?;

        Ok(Self {
            api_url: var("PONY_API_URL").unwrap_or(defaults.api_url),
            store_path: var("PONY_STORE_PATH").map(PathBuf::from).unwrap_or(defaults.store_path),
            request_timeout,
            stale_after,
        })
    }
}
