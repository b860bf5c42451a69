//! Property-based tests for batch assembly.
//!
//! Whatever mix of per-symbol outcomes the orchestrator produces, every
//! requested symbol appears exactly once and the batch only fails when no
//! symbol produced a quote.

use std::collections::HashSet;

use chrono::Utc;
use proptest::prelude::*;
use rust_decimal_macros::dec;

use quotewatch_core::market_data::{
    BatchFetch, FetchFailure, FetchStatus, FetchedQuote, QuoteData, QuoteOrigin,
};
use quotewatch_core::{BatchError, BatchQuotes};

#[derive(Debug, Clone, Copy)]
enum Outcome {
    Provider,
    Cache,
    Stale,
    Exhausted,
}

fn arb_outcome() -> impl Strategy<Value = Outcome> {
    prop_oneof![
        Just(Outcome::Provider),
        Just(Outcome::Cache),
        Just(Outcome::Stale),
        Just(Outcome::Exhausted),
    ]
}

/// Requested symbols (duplicates allowed) plus one outcome per symbol.
fn arb_batch() -> impl Strategy<Value = (Vec<String>, Vec<Outcome>)> {
    (
        prop::collection::vec("[A-E]", 1..12),
        prop::collection::vec(arb_outcome(), 5),
    )
}

fn outcome_for(symbol: &str, outcomes: &[Outcome]) -> Outcome {
    let index = (symbol.as_bytes()[0] - b'A') as usize;
    outcomes[index]
}

fn fetch_results(symbols: &[String], outcomes: &[Outcome]) -> BatchFetch {
    let mut results = BatchFetch::new();
    for symbol in symbols {
        let quote = QuoteData::new(symbol, dec!(10), dec!(0), dec!(0), 1, "A", Utc::now());
        let fetched = |origin: QuoteOrigin, status: FetchStatus| -> Result<FetchedQuote, FetchFailure> {
            Ok(FetchedQuote {
                quote: quote.clone(),
                origin,
                status,
                attempts: Vec::new(),
            })
        };
        let result = match outcome_for(symbol, outcomes) {
            Outcome::Provider => fetched(QuoteOrigin::Provider("A".into()), FetchStatus::Fresh),
            Outcome::Cache => fetched(QuoteOrigin::Cache, FetchStatus::Fresh),
            Outcome::Stale => fetched(QuoteOrigin::StaleCache, FetchStatus::Degraded),
            Outcome::Exhausted => Err(FetchFailure::AllSourcesExhausted {
                symbol: symbol.clone(),
                attempts: Vec::new(),
            }),
        };
        results.insert(symbol.clone(), result);
    }
    results
}

proptest! {
    #[test]
    fn assembled_batch_covers_every_symbol_once((symbols, outcomes) in arb_batch()) {
        let unique: HashSet<&String> = symbols.iter().collect();
        let succeeded: HashSet<&String> = unique
            .iter()
            .copied()
            .filter(|s| !matches!(outcome_for(s, &outcomes), Outcome::Exhausted))
            .collect();

        let assembled = BatchQuotes::assemble(&symbols, fetch_results(&symbols, &outcomes));

        if succeeded.is_empty() {
            match assembled {
                Err(BatchError::AllSourcesExhausted { symbols: failed, failures }) => {
                    prop_assert_eq!(failed.len(), unique.len());
                    prop_assert_eq!(failures.len(), unique.len());
                }
                other => prop_assert!(false, "expected exhaustion, got {:?}", other),
            }
        } else {
            let batch = assembled.unwrap();
            prop_assert_eq!(batch.quotes.len(), unique.len());
            prop_assert_eq!(batch.found(), succeeded.len());

            let any_cached = succeeded.iter().any(|s| {
                matches!(outcome_for(s, &outcomes), Outcome::Cache | Outcome::Stale)
            });
            prop_assert_eq!(batch.from_cache, any_cached);

            for symbol in &batch.degraded {
                prop_assert!(matches!(outcome_for(symbol, &outcomes), Outcome::Stale));
                prop_assert!(batch.get(symbol).is_some());
            }
        }
    }
}
