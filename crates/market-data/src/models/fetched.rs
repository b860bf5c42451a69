//! Fetch results tagged with their origin and the provider attempts behind them.

use std::fmt;

use super::quote::QuoteData;
use super::types::ProviderId;

/// Where a returned quote came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QuoteOrigin {
    /// Fetched just now from the named provider.
    Provider(ProviderId),
    /// Fresh entry from the result cache.
    Cache,
    /// Expired cache entry served because every provider failed.
    StaleCache,
}

impl QuoteOrigin {
    pub fn is_cached(&self) -> bool {
        matches!(self, Self::Cache | Self::StaleCache)
    }
}

impl fmt::Display for QuoteOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Provider(id) => write!(f, "{}", id),
            Self::Cache => write!(f, "CACHE"),
            Self::StaleCache => write!(f, "STALE_CACHE"),
        }
    }
}

/// Freshness of a returned quote.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchStatus {
    Fresh,
    /// Known to be stale; no provider could supply a newer value.
    Degraded,
}

/// What happened when a single provider was tried.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    Failed(String),
}

/// Record of a single provider attempt during a fetch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderAttempt {
    pub provider_id: ProviderId,
    pub outcome: AttemptOutcome,
}

impl ProviderAttempt {
    pub fn success(provider_id: ProviderId) -> Self {
        Self {
            provider_id,
            outcome: AttemptOutcome::Success,
        }
    }

    pub fn failed(provider_id: ProviderId, error: impl Into<String>) -> Self {
        Self {
            provider_id,
            outcome: AttemptOutcome::Failed(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == AttemptOutcome::Success
    }
}

/// A quote returned by the orchestrator.
#[derive(Clone, Debug)]
pub struct FetchedQuote {
    pub quote: QuoteData,
    pub origin: QuoteOrigin,
    pub status: FetchStatus,
    /// Providers tried for this fetch, in order. Empty for fresh cache hits.
    pub attempts: Vec<ProviderAttempt>,
}

impl FetchedQuote {
    pub fn is_degraded(&self) -> bool {
        self.status == FetchStatus::Degraded
    }

    /// Summary for logging/debugging.
    pub fn attempt_summary(&self) -> String {
        summarize_attempts(&self.attempts)
    }
}

/// Render attempts as `A: ERROR (timeout) -> B: SUCCESS`.
pub(crate) fn summarize_attempts(attempts: &[ProviderAttempt]) -> String {
    attempts
        .iter()
        .map(|a| match &a.outcome {
            AttemptOutcome::Success => format!("{}: SUCCESS", a.provider_id),
            AttemptOutcome::Failed(err) => format!("{}: ERROR ({})", a.provider_id, err),
        })
        .collect::<Vec<_>>()
        .join(" -> ")
}
