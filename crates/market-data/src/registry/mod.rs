//! Provider orchestration.
//!
//! - `orchestrator` - Cache lookup, priority fallback and stale degradation
//! - `rate_limiter` - Per-provider sliding window admission
//! - `settings` - Copy-on-write provider configuration
//! - `validator` - Quote payload sanity checks

mod orchestrator;
mod rate_limiter;
mod settings;
mod validator;

pub use orchestrator::{BatchFetch, ProviderOrchestrator};
pub use rate_limiter::RateLimiter;
pub use settings::ProviderSettings;
pub use validator::{QuoteValidator, ValidationIssue, ValidationSeverity, ValidatorConfig};
