use std::borrow::Cow;

/// Provider identifier - mostly static constants
pub type ProviderId = Cow<'static, str>;

/// Watchlist symbol (e.g. "AAPL", "BTC-USD")
pub type Symbol = String;
