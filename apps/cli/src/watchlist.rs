//! Periodic watchlist refresh.
//!
//! Submits the watchlist as one batch every refresh interval and pumps the
//! engine's dispatcher on the main task. A refresh is skipped while the
//! previous batch is still in flight.

use std::cell::Cell;
use std::future::Future;
use std::rc::Rc;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use quotewatch_core::{BatchError, BatchQuotes, Priority, QuoteEngine};

pub async fn run<S>(engine: &mut QuoteEngine, shutdown: S) -> anyhow::Result<()>
where
    S: Future<Output = ()>,
{
    let symbols = engine.config().watchlist.clone();
    if symbols.is_empty() {
        warn!("QW_WATCHLIST is empty, nothing to refresh");
        return Ok(());
    }
    info!(
        "Refreshing {} symbol(s) every {:?}: {}",
        symbols.len(),
        engine.config().refresh_interval,
        symbols.join(", ")
    );

    let mut refresh = interval(engine.config().refresh_interval);
    refresh.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut dispatch = interval(engine.config().dispatch_interval);
    dispatch.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    let in_flight = Rc::new(Cell::new(false));
    let mut round: u64 = 0;

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown requested");
                break;
            }
            _ = refresh.tick() => {
                if in_flight.get() {
                    debug!("Previous refresh still running, skipping this round");
                    continue;
                }
                round += 1;
                let ok_flag = in_flight.clone();
                let err_flag = in_flight.clone();
                let job_id = engine.submit_batch(
                    symbols.clone(),
                    Priority::Normal,
                    move |batch| {
                        ok_flag.set(false);
                        report(round, &batch);
                    },
                    move |error| {
                        err_flag.set(false);
                        report_error(round, &error);
                    },
                )?;
                in_flight.set(true);
                debug!("Refresh round {} queued as {}", round, job_id);
            }
            _ = dispatch.tick() => {
                engine.pump();
            }
        }
    }
    Ok(())
}

fn report(round: u64, batch: &BatchQuotes) {
    info!(
        "Round {}: {}/{} quotes{}",
        round,
        batch.found(),
        batch.quotes.len(),
        if batch.from_cache { " (some from cache)" } else { "" }
    );

    let mut symbols: Vec<&String> = batch.quotes.keys().collect();
    symbols.sort();
    for symbol in symbols {
        match batch.get(symbol) {
            Some(quote) => {
                let marker = if batch.degraded.contains(symbol) { " STALE" } else { "" };
                info!(
                    "  {:<8} {:>10} {:>+9} ({:>6}%)  via {}{}",
                    symbol,
                    quote.price.round_dp(2),
                    quote.change.round_dp(2),
                    quote.change_percent.round_dp(2),
                    quote.source_id,
                    marker
                );
            }
            None => warn!("  {:<8} unavailable", symbol),
        }
    }
}

fn report_error(round: u64, error: &BatchError) {
    warn!("Round {} failed: {}", round, error);
}
