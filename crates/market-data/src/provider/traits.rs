//! Quote provider trait definition.

use std::time::Duration;

use async_trait::async_trait;

use crate::errors::FetchError;
use crate::models::QuoteData;

/// Trait for quote providers.
///
/// Implement this trait to add support for a new data source. Providers are
/// opaque to the orchestrator: it only knows the id, which it uses to look up
/// the provider's `ProviderConfig`, and the uniform fetch signature.
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use quotewatch_market_data::provider::QuoteProvider;
///
/// struct MyProvider {
///     api_key: String,
/// }
///
/// #[async_trait]
/// impl QuoteProvider for MyProvider {
///     fn id(&self) -> &str {
///         "MY_PROVIDER"
///     }
///
///     async fn fetch_quote(&self, symbol: &str, timeout: Duration) -> Result<QuoteData, FetchError> {
///         // ... call the upstream API
///     }
/// }
/// ```
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Unique identifier for this provider.
    ///
    /// Must match the `source_id` of the provider's `ProviderConfig`.
    /// Used for logging, rate limiting and tagging returned quotes.
    fn id(&self) -> &str;

    /// Fetch the latest quote for a symbol.
    ///
    /// `timeout` is the provider's configured budget. Implementations should
    /// pass it on to their transport; the orchestrator enforces it as well.
    async fn fetch_quote(&self, symbol: &str, timeout: Duration) -> Result<QuoteData, FetchError>;
}
