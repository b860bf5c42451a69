//! Quote provider abstractions and implementations.
//!
//! This module contains:
//! - The `QuoteProvider` trait that all providers implement
//! - `SimulatedProvider`, an in-process provider with a configurable
//!   latency and failure profile
//!
//! # Architecture
//!
//! The provider system is designed to be:
//! - **Provider-agnostic**: The orchestrator treats every provider the same way
//! - **Extensible**: New providers can be added by implementing `QuoteProvider`
//! - **Policy-free**: Priority, rate limits and timeouts live in `ProviderConfig`,
//!   not in the provider itself

mod simulated;
mod traits;

pub use simulated::SimulatedProvider;
pub use traits::QuoteProvider;
