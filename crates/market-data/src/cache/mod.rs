//! Two-tier result cache.
//!
//! - `result_cache` - TTL cache with a concurrent memory tier and optional
//!   persisted tier; expired entries remain readable as stale values
//! - `disk` - One-JSON-file-per-key store backing the persisted tier
//! - `clock` - Time source, swappable in tests

mod clock;
mod disk;
mod result_cache;

pub use clock::{Clock, SystemClock};
pub use disk::DiskStore;
pub use result_cache::{CacheEntry, CacheStats, ResultCache};
