//! QuoteWatch Market Data Crate
//!
//! Provider-agnostic quote acquisition with caching and fallback.
//!
//! # Overview
//!
//! - Multiple providers behind one [`QuoteProvider`] trait
//! - Priority-ordered fallback; the first provider that answers wins
//! - Per-provider sliding window rate limiting
//! - Two-tier (memory + disk) result cache with stale fallback
//!
//! # Architecture
//!
//! ```text
//!                          +----------------------+
//!   fetch(symbol) -------> | ProviderOrchestrator |
//!                          +----------------------+
//!                             |        |        |
//!                             v        v        v
//!                      ResultCache  RateLimiter  ProviderSettings
//!                             |        |
//!                             |        v
//!                             |   QuoteProvider (priority order)
//!                             v
//!                        memory -> disk
//! ```
//!
//! # Core Types
//!
//! - [`QuoteData`] - Point-in-time quote snapshot
//! - [`FetchedQuote`] - Quote plus origin, freshness and provider attempts
//! - [`ProviderConfig`] - Priority, rate limit and timeout for one provider
//! - [`ResultCache`] - TTL cache shared by all fetches

pub mod cache;
pub mod errors;
pub mod models;
pub mod provider;
pub mod registry;

pub use models::{
    AttemptOutcome, FetchStatus, FetchedQuote, ProviderAttempt, ProviderConfig, ProviderId,
    QuoteData, QuoteOrigin, Symbol, DEFAULT_PROVIDER_PRIORITY,
};

pub use errors::{CacheError, FallbackClass, FetchError, FetchFailure};

pub use provider::{QuoteProvider, SimulatedProvider};

pub use cache::{CacheEntry, CacheStats, Clock, DiskStore, ResultCache, SystemClock};

pub use registry::{
    BatchFetch, ProviderOrchestrator, ProviderSettings, QuoteValidator, RateLimiter,
    ValidatorConfig,
};
