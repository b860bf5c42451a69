use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Point-in-time quote snapshot for a single symbol.
///
/// Values are idempotent snapshots: writing the same symbol twice simply
/// replaces the older snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteData {
    /// Symbol as requested by the caller
    pub symbol: String,

    /// Last traded price
    pub price: Decimal,

    /// Absolute change since previous close
    pub change: Decimal,

    /// Percentage change since previous close
    pub change_percent: Decimal,

    /// Traded volume for the session
    pub volume: u64,

    /// Market capitalisation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_cap: Option<Decimal>,

    /// Price / earnings ratio
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pe_ratio: Option<Decimal>,

    /// 52 week high
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high_52w: Option<Decimal>,

    /// 52 week low
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low_52w: Option<Decimal>,

    /// Provider that produced the quote
    pub source_id: String,

    /// Quote time in whole seconds since the Unix epoch
    pub timestamp_seconds: i64,
}

impl QuoteData {
    /// Create a quote with the required fields; optional fundamentals are left empty.
    pub fn new(
        symbol: impl Into<String>,
        price: Decimal,
        change: Decimal,
        change_percent: Decimal,
        volume: u64,
        source_id: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            change,
            change_percent,
            volume,
            market_cap: None,
            pe_ratio: None,
            high_52w: None,
            low_52w: None,
            source_id: source_id.into(),
            timestamp_seconds: timestamp.timestamp(),
        }
    }

    /// Quote time as a UTC timestamp.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.timestamp_seconds, 0).single()
    }

    pub fn with_fundamentals(
        mut self,
        market_cap: Option<Decimal>,
        pe_ratio: Option<Decimal>,
    ) -> Self {
        self.market_cap = market_cap;
        self.pe_ratio = pe_ratio;
        self
    }

    pub fn with_52w_range(mut self, low: Decimal, high: Decimal) -> Self {
        self.low_52w = Some(low);
        self.high_52w = Some(high);
        self
    }
}
