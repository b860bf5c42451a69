//! Quote engine: the caller-facing entry point.
//!
//! A batch of symbols becomes one scheduler job. A worker runs
//! `ProviderOrchestrator::fetch_many` for it, and the outcome reaches the
//! caller's callbacks through the dispatcher the next time the owner calls
//! [`QuoteEngine::pump`] (or while [`QuoteEngine::run_dispatcher`] runs).
//!
//! The engine owns the dispatcher, so it lives on the thread that created
//! it; callbacks do not need to be `Send`.

use std::future::Future;
use std::sync::Arc;

use log::{debug, info, warn};

use quotewatch_market_data::{
    CacheStats, ProviderConfig, ProviderOrchestrator, ProviderSettings, QuoteData,
    QuoteProvider, ResultCache, Symbol,
};
use quotewatch_scheduler::{
    CallbackBinding, JobId, Priority, ResultDispatcher, SchedulerError, SchedulerStats,
    TaskScheduler,
};

use crate::batch::BatchQuotes;
use crate::config::EngineConfig;
use crate::errors::{BatchError, EngineError};

/// Scheduler and cache counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineStats {
    pub scheduler: SchedulerStats,
    pub cache: CacheStats,
}

pub struct QuoteEngine {
    orchestrator: Arc<ProviderOrchestrator>,
    scheduler: TaskScheduler<BatchQuotes, BatchError>,
    dispatcher: ResultDispatcher<BatchQuotes, BatchError>,
    config: EngineConfig,
}

impl QuoteEngine {
    /// Create an engine around an existing orchestrator. Workers are not
    /// started until [`start`](Self::start).
    pub fn new(orchestrator: Arc<ProviderOrchestrator>, config: EngineConfig) -> Self {
        let (scheduler, receiver) = TaskScheduler::new(config.scheduler_config());
        Self {
            orchestrator,
            scheduler,
            dispatcher: ResultDispatcher::new(receiver),
            config,
        }
    }

    /// Build the cache, provider settings and orchestrator from `config`.
    ///
    /// Provider configuration comes from the providers file when one is set,
    /// otherwise each provider gets the defaults and is tried in registration order.
    pub fn from_config(
        config: EngineConfig,
        providers: Vec<Arc<dyn QuoteProvider>>,
    ) -> Result<Self, EngineError> {
        let cache: ResultCache<QuoteData> = match &config.cache_dir {
            Some(dir) => {
                let cache = ResultCache::persistent(dir, config.cache_ttl)?;
                let warmed = cache.warm_from_disk()?;
                info!(
                    "Quote cache at {} ({} persisted entries loaded)",
                    dir.display(),
                    warmed
                );
                cache
            }
            None => {
                info!("Quote cache is memory only");
                ResultCache::in_memory(config.cache_ttl)
            }
        };

        let provider_configs = match config.load_providers()? {
            Some(configs) => configs,
            None => providers
                .iter()
                .enumerate()
                .map(|(index, p)| {
                    ProviderConfig::new(p.id().to_string()).with_priority(index as i32)
                })
                .collect(),
        };

        let orchestrator = ProviderOrchestrator::new(
            providers,
            Arc::new(ProviderSettings::new(provider_configs)),
            Arc::new(cache),
        );
        Ok(Self::new(Arc::new(orchestrator), config))
    }

    /// Start the worker pool on the current tokio runtime.
    pub fn start(&self) -> Result<(), SchedulerError> {
        self.scheduler.start(self.config.workers)
    }

    /// Queue a fetch for `symbols`.
    ///
    /// Exactly one of `on_result` / `on_error` runs, during a later `pump`,
    /// unless the batch is cancelled first.
    pub fn submit_batch<S, F>(
        &mut self,
        symbols: Vec<Symbol>,
        priority: Priority,
        on_result: S,
        on_error: F,
    ) -> Result<JobId, SchedulerError>
    where
        S: FnOnce(BatchQuotes) + 'static,
        F: FnOnce(BatchError) + 'static,
    {
        let orchestrator = Arc::clone(&self.orchestrator);
        let concurrency = self.config.fetch_concurrency;
        let count = symbols.len();

        let job_id = self.scheduler.submit(
            async move {
                let fetched = orchestrator.fetch_many(&symbols, concurrency).await;
                BatchQuotes::assemble(&symbols, fetched)
            },
            priority,
            None,
        )?;

        self.dispatcher.register(
            job_id,
            CallbackBinding::new()
                .on_success(on_result)
                .on_error(move |error| on_error(BatchError::from(error))),
        );
        debug!("Queued batch {} with {} symbol(s) at {}", job_id, count, priority);
        Ok(job_id)
    }

    /// Cancel a batch that has not started. Its callbacks are dropped
    /// without being called.
    pub fn cancel(&mut self, job_id: JobId) -> bool {
        if self.scheduler.cancel(job_id) {
            self.dispatcher.forget(job_id);
            true
        } else {
            false
        }
    }

    /// Deliver every completed batch to its callbacks. Never blocks.
    pub fn pump(&mut self) -> usize {
        self.dispatcher.pump()
    }

    /// Pump at the configured dispatch interval until `shutdown` resolves.
    pub async fn run_dispatcher<S>(&mut self, shutdown: S)
    where
        S: Future<Output = ()>,
    {
        let interval = self.config.dispatch_interval;
        self.dispatcher.run(interval, shutdown).await;
    }

    /// Stop the workers and deliver whatever they produced, including
    /// shutdown errors for batches that never ran.
    pub async fn shutdown(&mut self) {
        self.scheduler.stop().await;
        let delivered = self.dispatcher.pump();
        if self.dispatcher.pending() > 0 {
            warn!(
                "{} batch(es) still running at shutdown; their results will be dropped",
                self.dispatcher.pending()
            );
        }
        info!("Quote engine stopped ({} final result(s) delivered)", delivered);
    }

    pub fn providers(&self) -> &Arc<ProviderSettings> {
        self.orchestrator.settings()
    }

    /// Enable or disable a provider for subsequent fetches.
    pub fn set_provider_enabled(&self, source_id: &str, enabled: bool) -> bool {
        self.providers().set_enabled(source_id, enabled)
    }

    pub fn upsert_provider(&self, config: ProviderConfig) {
        self.providers().upsert(config);
    }

    pub fn orchestrator(&self) -> &Arc<ProviderOrchestrator> {
        &self.orchestrator
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            scheduler: self.scheduler.stats(),
            cache: self.orchestrator.cache().stats(),
        }
    }
}
