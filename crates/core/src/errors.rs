//! Core error types.

use std::convert::Infallible;
use std::path::PathBuf;

use thiserror::Error;

use quotewatch_market_data::errors::{CacheError, FetchFailure};
use quotewatch_market_data::Symbol;
use quotewatch_scheduler::{SchedulerError, TaskError};

/// Why a submitted batch produced no quotes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BatchError {
    /// No symbol in the batch could be served by any provider or the cache.
    #[error("All sources exhausted for {}", .symbols.join(", "))]
    AllSourcesExhausted {
        symbols: Vec<Symbol>,
        failures: Vec<FetchFailure>,
    },

    /// The batch job itself did not complete (timeout, panic, shutdown).
    #[error("Batch job did not complete: {0}")]
    Scheduler(TaskError<Infallible>),
}

impl From<TaskError<BatchError>> for BatchError {
    fn from(error: TaskError<BatchError>) -> Self {
        match error {
            TaskError::Failed(inner) => inner,
            TaskError::Timeout(after) => Self::Scheduler(TaskError::Timeout(after)),
            TaskError::Panicked(message) => Self::Scheduler(TaskError::Panicked(message)),
            TaskError::Shutdown => Self::Scheduler(TaskError::Shutdown),
        }
    }
}

/// Invalid or unreadable configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("Failed to read provider file {path}: {source}")]
    ProvidersFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse provider file {path}: {source}")]
    ProvidersParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors raised while assembling or controlling the engine.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_failed_task_unwraps_batch_error() {
        let inner = BatchError::AllSourcesExhausted {
            symbols: vec!["AAPL".to_string(), "MSFT".to_string()],
            failures: Vec::new(),
        };
        let converted = BatchError::from(TaskError::Failed(inner.clone()));
        assert_eq!(converted, inner);
        assert_eq!(converted.to_string(), "All sources exhausted for AAPL, MSFT");
    }

    #[test]
    fn test_scheduler_side_errors_are_wrapped() {
        assert_eq!(
            BatchError::from(TaskError::Shutdown),
            BatchError::Scheduler(TaskError::Shutdown)
        );
        let timeout = BatchError::from(TaskError::Timeout(Duration::from_secs(30)));
        assert_eq!(
            timeout.to_string(),
            "Batch job did not complete: Job timed out after 30s"
        );
    }
}
