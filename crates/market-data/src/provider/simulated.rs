//! In-process provider with a configurable latency and failure profile.
//!
//! Stands in for a real upstream API in the CLI and in tests. Prices are
//! either taken from a table or derived deterministically from the symbol.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use log::warn;
use rust_decimal::Decimal;

use super::traits::QuoteProvider;
use crate::errors::FetchError;
use crate::models::QuoteData;

/// What a simulated provider does for a given symbol.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Behaviour {
    Fail,
    Malformed,
    RateLimited,
}

pub struct SimulatedProvider {
    id: String,
    latency: Duration,
    prices: HashMap<String, Decimal>,
    behaviours: HashMap<String, Behaviour>,
    offline: AtomicBool,
    calls: Mutex<Vec<String>>,
}

impl SimulatedProvider {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            latency: Duration::ZERO,
            prices: HashMap::new(),
            behaviours: HashMap::new(),
            offline: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Delay applied to every call before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_price(mut self, symbol: impl Into<String>, price: Decimal) -> Self {
        self.prices.insert(symbol.into(), price);
        self
    }

    /// Fail with `ProviderUnavailable` for these symbols.
    pub fn failing_for<I, S>(mut self, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for symbol in symbols {
            self.behaviours.insert(symbol.into(), Behaviour::Fail);
        }
        self
    }

    /// Answer with a negative price for these symbols.
    pub fn malformed_for<I, S>(mut self, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for symbol in symbols {
            self.behaviours.insert(symbol.into(), Behaviour::Malformed);
        }
        self
    }

    /// Answer with `RateLimited` for these symbols.
    pub fn throttled_for<I, S>(mut self, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for symbol in symbols {
            self.behaviours.insert(symbol.into(), Behaviour::RateLimited);
        }
        self
    }

    /// Take the whole provider offline (or back online).
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Symbols requested so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.lock_calls().clone()
    }

    pub fn call_count(&self) -> usize {
        self.lock_calls().len()
    }

    fn lock_calls(&self) -> MutexGuard<'_, Vec<String>> {
        self.calls.lock().unwrap_or_else(|poisoned| {
            warn!("Simulated provider call log mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn price_for(&self, symbol: &str) -> Decimal {
        if let Some(price) = self.prices.get(symbol) {
            return *price;
        }
        // Stable pseudo price in [10.00, 509.99] so unknown symbols still quote.
        let seed = symbol
            .bytes()
            .fold(17u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
        Decimal::new(1_000 + (seed % 50_000) as i64, 2)
    }
}

#[async_trait]
impl QuoteProvider for SimulatedProvider {
    fn id(&self) -> &str {
        &self.id
    }

    async fn fetch_quote(&self, symbol: &str, timeout: Duration) -> Result<QuoteData, FetchError> {
        self.lock_calls().push(symbol.to_string());

        if self.latency > timeout {
            tokio::time::sleep(timeout).await;
            return Err(FetchError::Timeout {
                provider: self.id.clone(),
                after: timeout,
            });
        }
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if self.offline.load(Ordering::SeqCst) {
            return Err(FetchError::unavailable(&self.id, "provider offline"));
        }

        let price = self.price_for(symbol);
        match self.behaviours.get(symbol) {
            Some(Behaviour::Fail) => Err(FetchError::unavailable(
                &self.id,
                format!("no data for {}", symbol),
            )),
            Some(Behaviour::RateLimited) => Err(FetchError::RateLimited {
                provider: self.id.clone(),
            }),
            Some(Behaviour::Malformed) => Ok(QuoteData::new(
                symbol,
                -price,
                Decimal::ZERO,
                Decimal::ZERO,
                0,
                &self.id,
                Utc::now(),
            )),
            None => {
                let change = (price / Decimal::from(100)).round_dp(2);
                let change_percent = Decimal::ONE;
                Ok(QuoteData::new(
                    symbol,
                    price,
                    change,
                    change_percent,
                    1_000_000,
                    &self.id,
                    Utc::now(),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_returns_table_price_and_tags_source() {
        let provider = SimulatedProvider::new("PRIMARY").with_price("AAPL", dec!(190.10));
        let quote = provider
            .fetch_quote("AAPL", Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(quote.price, dec!(190.10));
        assert_eq!(quote.source_id, "PRIMARY");
        assert_eq!(provider.calls(), vec!["AAPL".to_string()]);
    }

    #[tokio::test]
    async fn test_derived_price_is_stable() {
        let provider = SimulatedProvider::new("PRIMARY");
        let a = provider.fetch_quote("XYZ", Duration::from_secs(1)).await.unwrap();
        let b = provider.fetch_quote("XYZ", Duration::from_secs(1)).await.unwrap();
        assert_eq!(a.price, b.price);
        assert!(a.price >= dec!(10.00));
    }

    #[tokio::test]
    async fn test_failing_symbol() {
        let provider = SimulatedProvider::new("PRIMARY").failing_for(["X"]);
        let err = provider
            .fetch_quote("X", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::ProviderUnavailable { .. }));
        assert!(provider.fetch_quote("Y", Duration::from_secs(1)).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_over_budget_times_out() {
        let provider = SimulatedProvider::new("SLOW").with_latency(Duration::from_secs(30));
        let err = provider
            .fetch_quote("AAPL", Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_offline_toggle() {
        let provider = SimulatedProvider::new("PRIMARY");
        provider.set_offline(true);
        assert!(provider.fetch_quote("AAPL", Duration::from_secs(1)).await.is_err());
        provider.set_offline(false);
        assert!(provider.fetch_quote("AAPL", Duration::from_secs(1)).await.is_ok());
    }
}
