mod main_lib;
mod watchlist;

use main_lib::{build_engine, init_tracing};
use quotewatch_core::EngineConfig;

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = EngineConfig::from_env()?;
    init_tracing();

    let mut engine = build_engine(config)?;
    engine.start()?;

    let result = watchlist::run(&mut engine, shutdown_signal()).await;

    engine.shutdown().await;
    let stats = engine.stats();
    tracing::info!(
        "Completed {} batch(es), {} failed; {} cached quote(s)",
        stats.scheduler.completed,
        stats.scheduler.failed,
        stats.cache.memory_entries
    );
    result
}
