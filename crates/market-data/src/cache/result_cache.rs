//! TTL result cache with staleness fallback.
//!
//! Reads consult the memory tier first and fall back to the persisted tier,
//! warming memory on the way. `get` only returns entries younger than the
//! TTL; `get_stale` ignores the TTL so the orchestrator can still serve the
//! last known value when every provider is down.
//!
//! Expired entries are retained until `invalidate_expired` or `invalidate`
//! removes them; nothing purges them implicitly, since the stale value is
//! exactly what the orchestrator serves during an outage. Each key holds one
//! entry in each tier, so the persisted tier grows with the number of
//! distinct symbols, not with the number of refreshes.
//!
//! Same-key writers race last-write-wins. Values are point-in-time
//! snapshots, so losing an older write is harmless.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::clock::{Clock, SystemClock};
use super::disk::DiskStore;
use crate::errors::CacheError;

/// A cached value and the time it was stored.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry<V> {
    pub key: String,
    pub value: V,
    pub stored_at: DateTime<Utc>,
    pub ttl_seconds: u64,
}

impl<V> CacheEntry<V> {
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now.signed_duration_since(self.stored_at)
    }

    /// Fresh while `now - stored_at < ttl`.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        let ttl = chrono::Duration::seconds(self.ttl_seconds.min(i64::MAX as u64) as i64);
        self.age(now) < ttl
    }
}

/// Cache statistics.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub memory_entries: usize,
    pub fresh_entries: usize,
    pub persisted_entries: usize,
}

pub struct ResultCache<V> {
    memory: DashMap<String, CacheEntry<V>>,
    disk: Option<DiskStore>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<V> ResultCache<V>
where
    V: Clone + Serialize + DeserializeOwned + Send + Sync,
{
    /// Memory-only cache.
    pub fn in_memory(ttl: Duration) -> Self {
        Self {
            memory: DashMap::new(),
            disk: None,
            ttl,
            clock: Arc::new(SystemClock),
        }
    }

    /// Cache persisted under `dir`, which it owns exclusively.
    pub fn persistent(dir: impl Into<PathBuf>, ttl: Duration) -> Result<Self, CacheError> {
        let disk = DiskStore::open(dir)?;
        info!(
            "Result cache persisted at {} (ttl {:?})",
            disk.dir().display(),
            ttl
        );
        Ok(Self {
            memory: DashMap::new(),
            disk: Some(disk),
            ttl,
            clock: Arc::new(SystemClock),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up an entry in memory, then on disk.
    ///
    /// A disk hit is copied into memory so the next read stays in memory.
    fn lookup(&self, key: &str) -> Option<CacheEntry<V>> {
        if let Some(entry) = self.memory.get(key) {
            return Some(entry.value().clone());
        }

        let entry: CacheEntry<V> = self.disk.as_ref()?.read(key)?;
        if entry.key != key {
            warn!(
                "Cache file for '{}' holds key '{}', ignoring",
                key, entry.key
            );
            return None;
        }
        debug!("Warming memory cache for '{}' from disk", key);
        self.memory.insert(key.to_string(), entry.clone());
        Some(entry)
    }

    /// The value for `key` if it is younger than the TTL.
    pub fn get(&self, key: &str) -> Option<V> {
        let entry = self.lookup(key)?;
        if entry.is_fresh(self.clock.now()) {
            Some(entry.value)
        } else {
            None
        }
    }

    /// The value for `key` regardless of age.
    pub fn get_stale(&self, key: &str) -> Option<V> {
        self.lookup(key).map(|entry| entry.value)
    }

    /// The full entry for `key` regardless of age.
    pub fn get_entry(&self, key: &str) -> Option<CacheEntry<V>> {
        self.lookup(key)
    }

    /// Store `value` under `key`, replacing any previous entry.
    ///
    /// The memory tier is always updated; an error means only the persisted
    /// copy could not be written.
    pub fn set(&self, key: &str, value: V) -> Result<(), CacheError> {
        let entry = CacheEntry {
            key: key.to_string(),
            value,
            stored_at: self.clock.now(),
            ttl_seconds: self.ttl.as_secs(),
        };

        if let Some(disk) = &self.disk {
            // Persist first so the memory entry can be moved in afterwards.
            let persisted = disk.write(key, &entry);
            self.memory.insert(key.to_string(), entry);
            return persisted;
        }

        self.memory.insert(key.to_string(), entry);
        Ok(())
    }

    pub fn invalidate(&self, key: &str) -> Result<(), CacheError> {
        self.memory.remove(key);
        if let Some(disk) = &self.disk {
            disk.remove(key)?;
        }
        Ok(())
    }

    /// Purge every entry older than the TTL from both tiers.
    ///
    /// Returns the number of distinct keys removed.
    pub fn invalidate_expired(&self) -> Result<usize, CacheError> {
        let now = self.clock.now();

        let expired: HashSet<String> = self
            .memory
            .iter()
            .filter(|entry| !entry.value().is_fresh(now))
            .map(|entry| entry.key().clone())
            .collect();
        for key in &expired {
            // A concurrent `set` may have refreshed the entry meanwhile.
            self.memory.remove_if(key, |_, entry| !entry.is_fresh(now));
        }
        let mut removed = expired.len();

        if let Some(disk) = &self.disk {
            for key in disk.keys()? {
                if self.memory.contains_key(&key) {
                    continue;
                }
                if expired.contains(&key) {
                    disk.remove(&key)?;
                    continue;
                }
                let is_expired = match disk.read::<CacheEntry<V>>(&key) {
                    Some(entry) => !entry.is_fresh(now),
                    // Corrupt files are already removed by the read.
                    None => false,
                };
                if is_expired {
                    disk.remove(&key)?;
                    removed += 1;
                }
            }
        }

        if removed > 0 {
            debug!("Purged {} expired cache entries", removed);
        }
        Ok(removed)
    }

    /// Load every persisted entry into memory. Returns how many were loaded.
    pub fn warm_from_disk(&self) -> Result<usize, CacheError> {
        let Some(disk) = &self.disk else {
            return Ok(0);
        };
        let mut loaded = 0;
        for key in disk.keys()? {
            if self.memory.contains_key(&key) {
                continue;
            }
            if let Some(entry) = disk.read::<CacheEntry<V>>(&key) {
                self.memory.insert(key, entry);
                loaded += 1;
            }
        }
        Ok(loaded)
    }

    pub fn clear(&self) -> Result<(), CacheError> {
        self.memory.clear();
        if let Some(disk) = &self.disk {
            disk.clear()?;
        }
        Ok(())
    }

    pub fn stats(&self) -> CacheStats {
        let now = self.clock.now();
        let persisted_entries = match &self.disk {
            Some(disk) => disk.keys().map(|k| k.len()).unwrap_or_else(|e| {
                warn!("Failed to list persisted cache entries: {}", e);
                0
            }),
            None => 0,
        };
        CacheStats {
            memory_entries: self.memory.len(),
            fresh_entries: self
                .memory
                .iter()
                .filter(|entry| entry.value().is_fresh(now))
                .count(),
            persisted_entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    /// Clock that only moves when told to.
    struct ManualClock {
        now: Mutex<DateTime<Utc>>,
    }

    impl ManualClock {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                now: Mutex::new(Utc::now()),
            })
        }

        fn advance(&self, by: Duration) {
            let mut now = self.now.lock().unwrap();
            *now += chrono::Duration::from_std(by).unwrap();
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap()
        }
    }

    const TTL: Duration = Duration::from_secs(60);

    #[test]
    fn test_set_then_get_returns_value() {
        let cache = ResultCache::in_memory(TTL);
        cache.set("AAPL", 150u32).unwrap();
        assert_eq!(cache.get("AAPL"), Some(150));
        assert_eq!(cache.get("MSFT"), None);
    }

    #[test]
    fn test_expired_entry_only_available_as_stale() {
        let clock = ManualClock::new();
        let cache = ResultCache::in_memory(TTL).with_clock(clock.clone());
        cache.set("AAPL", 150u32).unwrap();

        clock.advance(Duration::from_secs(59));
        assert_eq!(cache.get("AAPL"), Some(150));

        clock.advance(Duration::from_secs(1));
        assert_eq!(cache.get("AAPL"), None);
        assert_eq!(cache.get_stale("AAPL"), Some(150));
    }

    #[test]
    fn test_expired_entries_are_retained_one_per_key() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new();
        let cache = ResultCache::persistent(dir.path(), TTL)
            .unwrap()
            .with_clock(clock.clone());

        for price in 1..=5u32 {
            cache.set("AAPL", price).unwrap();
            clock.advance(TTL * 2);
        }

        let stats = cache.stats();
        assert_eq!(stats.memory_entries, 1);
        assert_eq!(stats.fresh_entries, 0);
        assert_eq!(stats.persisted_entries, 1);
        assert_eq!(cache.get_stale("AAPL"), Some(5));
    }

    #[test]
    fn test_overwrite_is_last_write_wins() {
        let cache = ResultCache::in_memory(TTL);
        cache.set("AAPL", 1u32).unwrap();
        cache.set("AAPL", 2u32).unwrap();
        assert_eq!(cache.get("AAPL"), Some(2));
        assert_eq!(cache.stats().memory_entries, 1);
    }

    #[test]
    fn test_persisted_tier_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        {
            let cache = ResultCache::persistent(dir.path(), TTL).unwrap();
            cache.set("BRK.B", 412u32).unwrap();
        }

        let reopened: ResultCache<u32> = ResultCache::persistent(dir.path(), TTL).unwrap();
        assert_eq!(reopened.stats().memory_entries, 0);
        assert_eq!(reopened.get("BRK.B"), Some(412));
        // The read warmed the memory tier.
        assert_eq!(reopened.stats().memory_entries, 1);
    }

    #[test]
    fn test_stale_value_from_disk_after_restart() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new();
        {
            let cache = ResultCache::persistent(dir.path(), TTL)
                .unwrap()
                .with_clock(clock.clone());
            cache.set("AAPL", 150u32).unwrap();
        }
        clock.advance(Duration::from_secs(120));

        let reopened: ResultCache<u32> = ResultCache::persistent(dir.path(), TTL)
            .unwrap()
            .with_clock(clock.clone());
        assert_eq!(reopened.get("AAPL"), None);
        assert_eq!(reopened.get_stale("AAPL"), Some(150));
    }

    #[test]
    fn test_invalidate_expired_purges_both_tiers() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new();
        let cache = ResultCache::persistent(dir.path(), TTL)
            .unwrap()
            .with_clock(clock.clone());

        cache.set("OLD", 1u32).unwrap();
        clock.advance(Duration::from_secs(61));
        cache.set("NEW", 2u32).unwrap();

        assert_eq!(cache.invalidate_expired().unwrap(), 1);
        assert_eq!(cache.get_stale("OLD"), None);
        assert_eq!(cache.get("NEW"), Some(2));

        let stats = cache.stats();
        assert_eq!(stats.memory_entries, 1);
        assert_eq!(stats.persisted_entries, 1);
    }

    #[test]
    fn test_invalidate_expired_handles_disk_only_entries() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new();
        {
            let cache = ResultCache::persistent(dir.path(), TTL)
                .unwrap()
                .with_clock(clock.clone());
            cache.set("OLD", 1u32).unwrap();
        }
        clock.advance(Duration::from_secs(61));

        let reopened: ResultCache<u32> = ResultCache::persistent(dir.path(), TTL)
            .unwrap()
            .with_clock(clock.clone());
        assert_eq!(reopened.invalidate_expired().unwrap(), 1);
        assert_eq!(reopened.get_stale("OLD"), None);
    }

    #[test]
    fn test_invalidate_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResultCache::persistent(dir.path(), TTL).unwrap();
        cache.set("A", 1u32).unwrap();
        cache.set("B", 2u32).unwrap();

        cache.invalidate("A").unwrap();
        assert_eq!(cache.get_stale("A"), None);
        assert_eq!(cache.get("B"), Some(2));

        cache.clear().unwrap();
        assert_eq!(cache.stats(), CacheStats::default());
    }

    #[test]
    fn test_warm_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        {
            let cache = ResultCache::persistent(dir.path(), TTL).unwrap();
            cache.set("A", 1u32).unwrap();
            cache.set("B", 2u32).unwrap();
        }
        let reopened: ResultCache<u32> = ResultCache::persistent(dir.path(), TTL).unwrap();
        assert_eq!(reopened.warm_from_disk().unwrap(), 2);
        assert_eq!(reopened.stats().fresh_entries, 2);
    }

    #[test]
    fn test_concurrent_writers_on_different_keys() {
        let cache = Arc::new(ResultCache::in_memory(TTL));
        let handles: Vec<_> = (0..8u32)
            .map(|i| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for n in 0..50u32 {
                        cache.set(&format!("SYM{}", i), n).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        for i in 0..8u32 {
            assert_eq!(cache.get(&format!("SYM{}", i)), Some(49));
        }
    }
}
