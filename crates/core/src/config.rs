//! Engine configuration loaded from the environment.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `QW_WORKERS` | 4 |
//! | `QW_FETCH_CONCURRENCY` | 4 |
//! | `QW_CACHE_DIR` | `./cache/quotes` (empty disables persistence) |
//! | `QW_CACHE_TTL_SECS` | 60 |
//! | `QW_POLL_INTERVAL_MS` | 250 |
//! | `QW_DISPATCH_MS` | 100 |
//! | `QW_JOB_TIMEOUT_SECS` | 30 (0 disables) |
//! | `QW_SHUTDOWN_GRACE_MS` | 2000 |
//! | `QW_WATCHLIST` | empty |
//! | `QW_REFRESH_SECS` | 15 |
//! | `QW_PROVIDERS_FILE` | unset |

use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use quotewatch_market_data::{ProviderConfig, Symbol};
use quotewatch_scheduler::SchedulerConfig;

use crate::errors::ConfigError;

const DEFAULT_CACHE_DIR: &str = "./cache/quotes";

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub workers: usize,
    /// Symbols fetched in parallel within one batch.
    pub fetch_concurrency: usize,
    pub cache_dir: Option<PathBuf>,
    pub cache_ttl: Duration,
    pub poll_interval: Duration,
    pub dispatch_interval: Duration,
    pub job_timeout: Option<Duration>,
    pub shutdown_grace: Duration,
    pub watchlist: Vec<Symbol>,
    pub refresh_interval: Duration,
    pub providers_file: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            fetch_concurrency: 4,
            cache_dir: Some(PathBuf::from(DEFAULT_CACHE_DIR)),
            cache_ttl: Duration::from_secs(60),
            poll_interval: Duration::from_millis(250),
            dispatch_interval: Duration::from_millis(100),
            job_timeout: Some(Duration::from_secs(30)),
            shutdown_grace: Duration::from_millis(2000),
            watchlist: Vec::new(),
            refresh_interval: Duration::from_secs(15),
            providers_file: None,
        }
    }
}

impl EngineConfig {
    /// Load from the process environment, reading `.env` first if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup. Missing keys take their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let workers: usize = parse_or("QW_WORKERS", &lookup, defaults.workers)?;
        if workers == 0 {
            return Err(invalid("QW_WORKERS", "0", "must be at least 1"));
        }
        let fetch_concurrency: usize =
            parse_or("QW_FETCH_CONCURRENCY", &lookup, defaults.fetch_concurrency)?;
        if fetch_concurrency == 0 {
            return Err(invalid("QW_FETCH_CONCURRENCY", "0", "must be at least 1"));
        }

        let cache_dir = match lookup("QW_CACHE_DIR") {
            Some(dir) if dir.trim().is_empty() => None,
            Some(dir) => Some(PathBuf::from(dir.trim())),
            None => defaults.cache_dir,
        };

        let job_timeout_secs: u64 = parse_or("QW_JOB_TIMEOUT_SECS", &lookup, 30)?;
        let job_timeout = (job_timeout_secs > 0).then(|| Duration::from_secs(job_timeout_secs));

        let watchlist = lookup("QW_WATCHLIST")
            .map(|raw| parse_watchlist(&raw))
            .unwrap_or_default();

        Ok(Self {
            workers,
            fetch_concurrency,
            cache_dir,
            cache_ttl: Duration::from_secs(parse_or("QW_CACHE_TTL_SECS", &lookup, 60)?),
            poll_interval: Duration::from_millis(positive("QW_POLL_INTERVAL_MS", &lookup, 250)?),
            dispatch_interval: Duration::from_millis(positive("QW_DISPATCH_MS", &lookup, 100)?),
            job_timeout,
            shutdown_grace: Duration::from_millis(parse_or(
                "QW_SHUTDOWN_GRACE_MS",
                &lookup,
                2000,
            )?),
            watchlist,
            refresh_interval: Duration::from_secs(positive("QW_REFRESH_SECS", &lookup, 15)?),
            providers_file: lookup("QW_PROVIDERS_FILE")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
        })
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            poll_interval: self.poll_interval,
            default_timeout: self.job_timeout,
            shutdown_grace: self.shutdown_grace,
        }
    }

    /// Provider configurations from `providers_file`, if one is set.
    pub fn load_providers(&self) -> Result<Option<Vec<ProviderConfig>>, ConfigError> {
        let Some(path) = &self.providers_file else {
            return Ok(None);
        };
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::ProvidersFile {
            path: path.clone(),
            source,
        })?;
        let configs = serde_json::from_str(&raw).map_err(|source| ConfigError::ProvidersParse {
            path: path.clone(),
            source,
        })?;
        Ok(Some(configs))
    }
}

/// Split a comma separated watchlist, trimming, upper-casing and dropping
/// empty entries and duplicates.
pub fn parse_watchlist(raw: &str) -> Vec<Symbol> {
    let mut symbols: Vec<Symbol> = Vec::new();
    for symbol in raw.split(',').map(|s| s.trim().to_uppercase()) {
        if !symbol.is_empty() && !symbols.contains(&symbol) {
            symbols.push(symbol);
        }
    }
    symbols
}

fn invalid(key: &'static str, value: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key,
        value: value.to_string(),
        reason: reason.into(),
    }
}

fn parse_or<T, F>(key: &'static str, lookup: &F, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| invalid(key, &raw, e.to_string())),
    }
}

fn positive<F>(key: &'static str, lookup: &F, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let value = parse_or(key, lookup, default)?;
    if value == 0 {
        return Err(invalid(key, "0", "must be greater than 0"));
    }
    Ok(value)
}
