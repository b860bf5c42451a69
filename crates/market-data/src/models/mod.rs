//! Market data models
//!
//! This module contains the core data types for quote acquisition:
//! - `types` - Type aliases for common identifiers (ProviderId, Symbol)
//! - `quote` - The point-in-time quote snapshot (QuoteData)
//! - `fetched` - A quote tagged with where it came from (FetchedQuote)
//! - `provider_config` - Per-provider scheduling and rate limit settings

mod fetched;
mod provider_config;
mod quote;
mod types;

pub(crate) use fetched::summarize_attempts;
pub use fetched::{AttemptOutcome, FetchStatus, FetchedQuote, ProviderAttempt, QuoteOrigin};
pub use provider_config::{ProviderConfig, DEFAULT_PROVIDER_PRIORITY};
pub use quote::QuoteData;
pub use types::{ProviderId, Symbol};
