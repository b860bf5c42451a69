//! Sliding window rate limiter for quote providers.
//!
//! Keeps the admission timestamps of the last `window` per provider. A
//! request is admitted when fewer than `limit` timestamps remain in the
//! window; otherwise the caller sleeps until the oldest one leaves it.
//!
//! Each provider has its own lock, so a saturated provider never delays
//! callers of another one.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use dashmap::DashMap;
use log::{debug, warn};
use tokio::time::Instant;

/// Admission timestamps for a single provider, oldest first.
#[derive(Debug, Default)]
struct SlidingWindow {
    admitted: VecDeque<Instant>,
}

impl SlidingWindow {
    /// Drop timestamps that are at least `window` old.
    fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(oldest) = self.admitted.front() {
            if now.duration_since(*oldest) >= window {
                self.admitted.pop_front();
            } else {
                break;
            }
        }
    }

    /// Admit now, or return how long to wait before trying again.
    fn try_admit(&mut self, now: Instant, limit: u32, window: Duration) -> Result<(), Duration> {
        if limit == 0 {
            return Ok(());
        }
        self.prune(now, window);

        if self.admitted.len() < limit as usize {
            self.admitted.push_back(now);
            return Ok(());
        }

        // len >= limit > 0, so there is an oldest entry.
        let oldest = self.admitted.front().copied().unwrap_or(now);
        Err(window.saturating_sub(now.duration_since(oldest)))
    }
}

/// Sliding window rate limiter for multiple providers.
///
/// Windows are created on first use. Limits are passed on every call so that
/// configuration changes apply to the next admission without a reset.
#[derive(Default)]
pub struct RateLimiter {
    windows: DashMap<String, Arc<Mutex<SlidingWindow>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the window for a provider, creating it on first use.
    ///
    /// The map shard lock is released before the returned window is locked.
    fn window_for(&self, source_id: &str) -> Arc<Mutex<SlidingWindow>> {
        if let Some(window) = self.windows.get(source_id) {
            return Arc::clone(window.value());
        }
        Arc::clone(
            self.windows
                .entry(source_id.to_string())
                .or_default()
                .value(),
        )
    }

    /// Lock a provider window, recovering from poison if necessary.
    ///
    /// The worst case after a poisoned lock is a slightly wrong admission
    /// count, which is better than taking every worker down with it.
    fn lock<'a>(
        source_id: &str,
        window: &'a Mutex<SlidingWindow>,
    ) -> MutexGuard<'a, SlidingWindow> {
        window.lock().unwrap_or_else(|poisoned| {
            warn!("Rate limiter window for '{}' was poisoned, recovering", source_id);
            poisoned.into_inner()
        })
    }

    /// Wait until a request to `source_id` is allowed, then record it.
    ///
    /// Only the calling task sleeps; the provider lock is never held across
    /// the wait. A `limit` of zero admits immediately.
    pub async fn admit(&self, source_id: &str, limit: u32, window: Duration) {
        let slot = self.window_for(source_id);

        loop {
            let wait_time = {
                let mut guard = Self::lock(source_id, &slot);
                match guard.try_admit(Instant::now(), limit, window) {
                    Ok(()) => {
                        debug!("Rate limiter: admitted request for '{}'", source_id);
                        return;
                    }
                    Err(wait) => wait,
                }
            };

            debug!(
                "Rate limiter: waiting {:?} for provider '{}'",
                wait_time, source_id
            );
            if wait_time.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(wait_time).await;
            }
        }
    }

    /// Admit without waiting.
    ///
    /// Returns true if the request was admitted and recorded.
    pub fn try_admit(&self, source_id: &str, limit: u32, window: Duration) -> bool {
        let slot = self.window_for(source_id);
        let mut guard = Self::lock(source_id, &slot);
        guard.try_admit(Instant::now(), limit, window).is_ok()
    }

    /// Number of admissions for `source_id` still inside `window`.
    pub fn in_window(&self, source_id: &str, window: Duration) -> usize {
        let Some(slot) = self.windows.get(source_id).map(|w| Arc::clone(w.value())) else {
            return 0;
        };
        let mut guard = Self::lock(source_id, &slot);
        guard.prune(Instant::now(), window);
        guard.admitted.len()
    }

    /// Forget all admissions for a provider.
    pub fn reset(&self, source_id: &str) {
        self.windows.remove(source_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(60);

    #[tokio::test(start_paused = true)]
    async fn test_admits_up_to_limit_immediately() {
        let limiter = RateLimiter::new();

        for _ in 0..3 {
            assert!(limiter.try_admit("PRIMARY", 3, WINDOW));
        }
        assert!(!limiter.try_admit("PRIMARY", 3, WINDOW));
        assert_eq!(limiter.in_window("PRIMARY", WINDOW), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fourth_admission_waits_for_oldest_to_leave_window() {
        let limiter = RateLimiter::new();

        let first = Instant::now();
        limiter.admit("PRIMARY", 3, WINDOW).await;
        tokio::time::advance(Duration::from_secs(10)).await;
        limiter.admit("PRIMARY", 3, WINDOW).await;
        limiter.admit("PRIMARY", 3, WINDOW).await;

        let before_fourth = Instant::now();
        limiter.admit("PRIMARY", 3, WINDOW).await;
        let waited = before_fourth.elapsed();

        // 60s window minus the 10s already elapsed since the first admission.
        assert!(waited >= Duration::from_secs(50), "waited {:?}", waited);
        assert!(waited < Duration::from_secs(51), "waited {:?}", waited);
        assert!(first.elapsed() >= WINDOW);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_slides() {
        let limiter = RateLimiter::new();

        assert!(limiter.try_admit("PRIMARY", 1, WINDOW));
        assert!(!limiter.try_admit("PRIMARY", 1, WINDOW));

        tokio::time::advance(WINDOW).await;
        assert!(limiter.try_admit("PRIMARY", 1, WINDOW));
    }

    #[tokio::test(start_paused = true)]
    async fn test_per_provider_isolation() {
        let limiter = RateLimiter::new();

        assert!(limiter.try_admit("PRIMARY", 1, WINDOW));
        assert!(!limiter.try_admit("PRIMARY", 1, WINDOW));

        // BACKUP has its own window.
        let start = Instant::now();
        limiter.admit("BACKUP", 1, WINDOW).await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_limit_is_unlimited() {
        let limiter = RateLimiter::new();
        for _ in 0..100 {
            assert!(limiter.try_admit("PRIMARY", 0, WINDOW));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset() {
        let limiter = RateLimiter::new();
        assert!(limiter.try_admit("PRIMARY", 1, WINDOW));
        assert!(!limiter.try_admit("PRIMARY", 1, WINDOW));

        limiter.reset("PRIMARY");
        assert!(limiter.try_admit("PRIMARY", 1, WINDOW));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_admissions_respect_limit() {
        let limiter = Arc::new(RateLimiter::new());
        let start = Instant::now();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                tokio::spawn(async move {
                    limiter.admit("PRIMARY", 2, WINDOW).await;
                    start.elapsed()
                })
            })
            .collect();

        let mut waits = Vec::new();
        for handle in handles {
            waits.push(handle.await.unwrap());
        }
        waits.sort();

        assert_eq!(waits[0], Duration::ZERO);
        assert_eq!(waits[1], Duration::ZERO);
        assert!(waits[2] >= WINDOW && waits[2] < WINDOW + Duration::from_secs(1));
        assert!(waits[3] >= WINDOW && waits[3] < WINDOW + Duration::from_secs(1));
    }
}
