//! Error types and fallback classification for the market data crate.
//!
//! This module provides:
//! - [`FetchError`]: A failure from a single provider call
//! - [`FetchFailure`]: The terminal failure of a whole fetch
//! - [`CacheError`]: Persisted cache tier failures
//! - [`FallbackClass`]: How the orchestrator reacts to a [`FetchError`]

mod fallback;

pub use fallback::FallbackClass;

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::models::{ProviderAttempt, Symbol};

/// Errors returned by a single provider call.
///
/// None of these reach the caller: the orchestrator logs them and moves on
/// to the next provider.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Network or authentication failure at the provider.
    #[error("Provider unavailable: {provider} - {message}")]
    ProviderUnavailable {
        /// The provider that failed
        provider: String,
        /// The error message from the provider
        message: String,
    },

    /// The call exceeded its time budget.
    #[error("Timeout: {provider} after {after:?}")]
    Timeout {
        /// The provider that timed out
        provider: String,
        /// The budget that was exceeded
        after: Duration,
    },

    /// The provider throttled the request (HTTP 429 or equivalent).
    #[error("Rate limited: {provider}")]
    RateLimited {
        /// The provider that rate limited the request
        provider: String,
    },

    /// The provider answered with a structurally invalid payload.
    #[error("Malformed response from {provider}: {message}")]
    MalformedResponse {
        /// The provider that returned the payload
        provider: String,
        /// What was wrong with it
        message: String,
    },
}

impl FetchError {
    pub fn unavailable(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProviderUnavailable {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn malformed(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Returns how the orchestrator should react to this error.
    ///
    /// # Examples
    ///
    /// ```
    /// use quotewatch_market_data::errors::{FallbackClass, FetchError};
    ///
    /// let error = FetchError::RateLimited { provider: "PRIMARY".to_string() };
    /// assert_eq!(error.fallback_class(), FallbackClass::Absorbed);
    ///
    /// let error = FetchError::unavailable("PRIMARY", "connection reset");
    /// assert_eq!(error.fallback_class(), FallbackClass::NextProvider);
    /// ```
    pub fn fallback_class(&self) -> FallbackClass {
        match self {
            Self::RateLimited { .. } => FallbackClass::Absorbed,
            Self::ProviderUnavailable { .. }
            | Self::Timeout { .. }
            | Self::MalformedResponse { .. } => FallbackClass::NextProvider,
        }
    }
}

/// Terminal failure of an orchestrated fetch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    /// Every enabled provider failed and there was no cached value to fall back on.
    #[error("All sources exhausted for {symbol}")]
    AllSourcesExhausted {
        symbol: Symbol,
        /// Providers tried, in order. Empty when none were enabled.
        attempts: Vec<ProviderAttempt>,
    },
}

impl FetchFailure {
    pub fn symbol(&self) -> &str {
        match self {
            Self::AllSourcesExhausted { symbol, .. } => symbol,
        }
    }
}

/// Errors from the persisted cache tier.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Cache entry could not be encoded or decoded: {0}")]
    Serde(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_unavailable_tries_next_provider() {
        let error = FetchError::unavailable("PRIMARY", "401 unauthorized");
        assert_eq!(error.fallback_class(), FallbackClass::NextProvider);
    }

    #[test]
    fn test_timeout_tries_next_provider() {
        let error = FetchError::Timeout {
            provider: "PRIMARY".to_string(),
            after: Duration::from_secs(5),
        };
        assert_eq!(error.fallback_class(), FallbackClass::NextProvider);
    }

    #[test]
    fn test_malformed_is_treated_like_unavailable() {
        let error = FetchError::malformed("PRIMARY", "missing price");
        assert_eq!(error.fallback_class(), FallbackClass::NextProvider);
    }

    #[test]
    fn test_rate_limited_is_absorbed() {
        let error = FetchError::RateLimited {
            provider: "PRIMARY".to_string(),
        };
        assert_eq!(error.fallback_class(), FallbackClass::Absorbed);
    }

    #[test]
    fn test_error_display() {
        let error = FetchError::unavailable("BACKUP", "API key invalid");
        assert_eq!(
            format!("{}", error),
            "Provider unavailable: BACKUP - API key invalid"
        );

        let failure = FetchFailure::AllSourcesExhausted {
            symbol: "AAPL".to_string(),
            attempts: Vec::new(),
        };
        assert_eq!(format!("{}", failure), "All sources exhausted for AAPL");
        assert_eq!(failure.symbol(), "AAPL");
    }
}
