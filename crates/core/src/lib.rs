//! QuoteWatch Core - the quote engine façade.
//!
//! Wires the market data orchestrator to the background scheduler and the
//! result dispatcher, and loads engine configuration from the environment.

pub mod batch;
pub mod config;
pub mod engine;
pub mod errors;

pub use batch::BatchQuotes;
pub use config::{parse_watchlist, EngineConfig};
pub use engine::{EngineStats, QuoteEngine};
pub use errors::{BatchError, ConfigError, EngineError};

// Re-export the types callers need to drive the engine.
pub use quotewatch_market_data as market_data;
pub use quotewatch_scheduler::{JobId, Priority};
