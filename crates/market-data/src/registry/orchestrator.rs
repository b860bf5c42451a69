//! Provider orchestrator: cache first, then providers in priority order.
//!
//! For each symbol the orchestrator:
//! 1. Returns a fresh cache entry if there is one
//! 2. Takes a snapshot of the enabled providers, lowest priority value first
//! 3. For each provider: waits for rate limiter admission, calls it under its
//!    configured timeout and validates the payload
//! 4. Caches and returns the first success; logs and skips failures
//! 5. When every provider failed, serves the stale cache entry as a degraded
//!    result, or reports `AllSourcesExhausted`
//!
//! Results from different providers are never merged: first success wins.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use log::{debug, info, warn};

use super::{ProviderSettings, QuoteValidator, RateLimiter};
use crate::cache::ResultCache;
use crate::errors::{FallbackClass, FetchError, FetchFailure};
use crate::models::{
    summarize_attempts, FetchStatus, FetchedQuote, ProviderAttempt, ProviderConfig, QuoteData,
    QuoteOrigin, Symbol,
};
use crate::provider::QuoteProvider;

/// Per-symbol outcomes of a batch fetch.
pub type BatchFetch = HashMap<Symbol, Result<FetchedQuote, FetchFailure>>;

pub struct ProviderOrchestrator {
    providers: HashMap<String, Arc<dyn QuoteProvider>>,
    settings: Arc<ProviderSettings>,
    rate_limiter: Arc<RateLimiter>,
    cache: Arc<ResultCache<QuoteData>>,
    validator: QuoteValidator,
}

impl ProviderOrchestrator {
    /// Create an orchestrator over `providers`.
    ///
    /// Providers are matched to their configuration by id. A provider with no
    /// configuration is never called; a configuration with no provider is
    /// skipped at fetch time.
    pub fn new(
        providers: Vec<Arc<dyn QuoteProvider>>,
        settings: Arc<ProviderSettings>,
        cache: Arc<ResultCache<QuoteData>>,
    ) -> Self {
        let providers: HashMap<String, Arc<dyn QuoteProvider>> = providers
            .into_iter()
            .map(|p| (p.id().to_string(), p))
            .collect();

        let snapshot = settings.snapshot();
        for id in providers.keys() {
            if !snapshot.iter().any(|c| c.source_id == id.as_str()) {
                warn!("Provider '{}' has no configuration and will not be used", id);
            }
        }

        Self {
            providers,
            settings,
            rate_limiter: Arc::new(RateLimiter::new()),
            cache,
            validator: QuoteValidator::new(),
        }
    }

    /// Share a rate limiter with other orchestrators.
    pub fn with_rate_limiter(mut self, rate_limiter: Arc<RateLimiter>) -> Self {
        self.rate_limiter = rate_limiter;
        self
    }

    pub fn with_validator(mut self, validator: QuoteValidator) -> Self {
        self.validator = validator;
        self
    }

    pub fn settings(&self) -> &Arc<ProviderSettings> {
        &self.settings
    }

    pub fn cache(&self) -> &Arc<ResultCache<QuoteData>> {
        &self.cache
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }

    /// Fetch the latest quote for `symbol`.
    ///
    /// Provider failures never surface here; they only show up in the
    /// returned attempts. The only error is `AllSourcesExhausted`.
    pub async fn fetch(&self, symbol: &str) -> Result<FetchedQuote, FetchFailure> {
        if let Some(quote) = self.cache.get(symbol) {
            debug!("Cache hit for {}", symbol);
            return Ok(FetchedQuote {
                quote,
                origin: QuoteOrigin::Cache,
                status: FetchStatus::Fresh,
                attempts: Vec::new(),
            });
        }

        // Read once; admin updates apply to the next fetch.
        let configs = self.settings.enabled_in_priority_order();
        if configs.is_empty() {
            warn!("No providers enabled while fetching {}", symbol);
        }

        let mut attempts: Vec<ProviderAttempt> = Vec::with_capacity(configs.len());

        for config in configs {
            let Some(provider) = self.providers.get(&*config.source_id) else {
                warn!(
                    "Provider '{}' is enabled but not registered, skipping",
                    config.source_id
                );
                attempts.push(ProviderAttempt::failed(
                    config.source_id.clone(),
                    "not registered",
                ));
                continue;
            };

            self.rate_limiter
                .admit(
                    &config.source_id,
                    config.requests_per_window,
                    config.window(),
                )
                .await;

            match self.call_provider(provider.as_ref(), &config, symbol).await {
                Ok(quote) => {
                    if let Err(e) = self.cache.set(symbol, quote.clone()) {
                        warn!("Failed to persist cached quote for {}: {}", symbol, e);
                    }
                    attempts.push(ProviderAttempt::success(config.source_id.clone()));
                    debug!(
                        "Fetched {} from '{}' ({})",
                        symbol,
                        config.source_id,
                        summarize_attempts(&attempts)
                    );
                    return Ok(FetchedQuote {
                        quote,
                        origin: QuoteOrigin::Provider(config.source_id),
                        status: FetchStatus::Fresh,
                        attempts,
                    });
                }
                Err(e) => {
                    match e.fallback_class() {
                        FallbackClass::NextProvider => warn!(
                            "Provider '{}' failed for {}: {}, trying next provider",
                            config.source_id, symbol, e
                        ),
                        FallbackClass::Absorbed => debug!(
                            "Provider '{}' throttled {}: {}, trying next provider",
                            config.source_id, symbol, e
                        ),
                    }
                    attempts.push(ProviderAttempt::failed(
                        config.source_id.clone(),
                        e.to_string(),
                    ));
                }
            }
        }

        if let Some(quote) = self.cache.get_stale(symbol) {
            info!(
                "All providers failed for {}, serving stale cache ({})",
                symbol,
                summarize_attempts(&attempts)
            );
            return Ok(FetchedQuote {
                quote,
                origin: QuoteOrigin::StaleCache,
                status: FetchStatus::Degraded,
                attempts,
            });
        }

        warn!(
            "All sources exhausted for {} ({})",
            symbol,
            summarize_attempts(&attempts)
        );
        Err(FetchFailure::AllSourcesExhausted {
            symbol: symbol.to_string(),
            attempts,
        })
    }

    /// Fetch several symbols with at most `concurrency` fetches in flight.
    ///
    /// Duplicate symbols are fetched once. Each symbol succeeds or fails
    /// independently.
    pub async fn fetch_many(&self, symbols: &[Symbol], concurrency: usize) -> BatchFetch {
        let unique: Vec<Symbol> = {
            let mut seen = HashSet::new();
            symbols
                .iter()
                .filter(|s| seen.insert(s.as_str()))
                .cloned()
                .collect()
        };

        stream::iter(unique)
            .map(move |symbol: Symbol| async move {
                let result = self.fetch(&symbol).await;
                (symbol, result)
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await
    }

    /// Call one provider under its timeout and validate the payload.
    ///
    /// On timeout the provider future is dropped at its next await point;
    /// work it already handed to another thread is not recalled.
    async fn call_provider(
        &self,
        provider: &dyn QuoteProvider,
        config: &ProviderConfig,
        symbol: &str,
    ) -> Result<QuoteData, FetchError> {
        let timeout = config.timeout();
        let quote = match tokio::time::timeout(timeout, provider.fetch_quote(symbol, timeout)).await
        {
            Ok(result) => result?,
            Err(_) => {
                return Err(FetchError::Timeout {
                    provider: config.source_id.to_string(),
                    after: timeout,
                })
            }
        };

        self.validator.validate(&config.source_id, symbol, &quote)?;
        Ok(quote)
    }
}
