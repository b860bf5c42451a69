use std::collections::{HashMap, HashSet};

use quotewatch_market_data::{BatchFetch, QuoteData, Symbol};

use crate::errors::BatchError;

/// Quotes delivered to a batch's success callback.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchQuotes {
    /// One entry per requested symbol; `None` when nothing could be served.
    pub quotes: HashMap<Symbol, Option<QuoteData>>,
    /// True if any quote came from the cache, fresh or stale.
    pub from_cache: bool,
    /// Symbols served from stale cache after every provider failed.
    pub degraded: HashSet<Symbol>,
}

impl BatchQuotes {
    /// Fold per-symbol fetch outcomes into a batch result.
    ///
    /// Fails only when symbols were requested and none produced a quote.
    pub fn assemble(symbols: &[Symbol], mut fetched: BatchFetch) -> Result<Self, BatchError> {
        let mut batch = BatchQuotes::default();
        let mut failures = Vec::new();

        for symbol in symbols {
            if batch.quotes.contains_key(symbol) {
                continue;
            }
            let quote = match fetched.remove(symbol) {
                Some(Ok(result)) => {
                    batch.from_cache |= result.origin.is_cached();
                    if result.is_degraded() {
                        batch.degraded.insert(symbol.clone());
                    }
                    Some(result.quote)
                }
                Some(Err(failure)) => {
                    failures.push(failure);
                    None
                }
                None => None,
            };
            batch.quotes.insert(symbol.clone(), quote);
        }

        if !batch.quotes.is_empty() && batch.found() == 0 {
            return Err(BatchError::AllSourcesExhausted {
                symbols: symbols_in_order(symbols),
                failures,
            });
        }
        Ok(batch)
    }

    /// Number of symbols with a quote.
    pub fn found(&self) -> usize {
        self.quotes.values().filter(|q| q.is_some()).count()
    }

    /// Symbols without a quote, sorted.
    pub fn missing(&self) -> Vec<&str> {
        let mut missing: Vec<&str> = self
            .quotes
            .iter()
            .filter(|(_, q)| q.is_none())
            .map(|(s, _)| s.as_str())
            .collect();
        missing.sort_unstable();
        missing
    }

    pub fn get(&self, symbol: &str) -> Option<&QuoteData> {
        self.quotes.get(symbol).and_then(Option::as_ref)
    }
}

fn symbols_in_order(symbols: &[Symbol]) -> Vec<Symbol> {
    let mut seen = HashSet::new();
    symbols
        .iter()
        .filter(|s| seen.insert(s.as_str()))
        .cloned()
        .collect()
}
