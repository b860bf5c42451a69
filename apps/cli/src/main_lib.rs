use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use quotewatch_core::market_data::{ProviderConfig, QuoteProvider, SimulatedProvider};
use quotewatch_core::{parse_watchlist, EngineConfig, QuoteEngine};

pub fn init_tracing() {
    let log_format = std::env::var("QW_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init();
    }
}

/// In-process stand-ins for the upstream quote APIs.
///
/// `QW_SIM_PRIMARY_FAILS` lists symbols the primary source refuses, which
/// exercises the fallback path.
fn simulated_providers() -> Vec<Arc<dyn QuoteProvider>> {
    let primary_fails = std::env::var("QW_SIM_PRIMARY_FAILS")
        .map(|raw| parse_watchlist(&raw))
        .unwrap_or_default();

    let primary = SimulatedProvider::new("PRIMARY")
        .with_latency(Duration::from_millis(120))
        .with_price("AAPL", Decimal::new(19_012, 2))
        .failing_for(primary_fails);
    let backup = SimulatedProvider::new("BACKUP").with_latency(Duration::from_millis(350));

    vec![Arc::new(primary), Arc::new(backup)]
}

/// Default provider order when no providers file is configured.
fn default_provider_configs() -> Vec<ProviderConfig> {
    vec![
        ProviderConfig::new("PRIMARY")
            .with_priority(10)
            .with_rate_limit(30, 60)
            .with_timeout(2),
        ProviderConfig::new("BACKUP")
            .with_priority(20)
            .with_rate_limit(10, 60)
            .with_timeout(5),
    ]
}

pub fn build_engine(config: EngineConfig) -> anyhow::Result<QuoteEngine> {
    let has_providers_file = config.providers_file.is_some();
    let engine = QuoteEngine::from_config(config, simulated_providers())?;
    if !has_providers_file {
        engine.providers().replace(default_provider_configs());
    }
    for provider in engine.providers().enabled_in_priority_order() {
        tracing::info!(
            "Provider {} (priority {}, {} req / {}s, timeout {}s)",
            provider.source_id,
            provider.priority,
            provider.requests_per_window,
            provider.window_seconds,
            provider.timeout_seconds
        );
    }
    Ok(engine)
}
