//! Per-client admission control.
//!
//! Each client identity gets a fixed window: the first request opens a 60 second window and at
//! most 5 requests are admitted inside it. The count resets once more than 60 seconds have passed
//! since the window opened; exactly 60 seconds is still inside the window.
//!
//! Expired entries are not evicted on a timer. An entry whose window has passed is reset lazily
//! the next time its client shows up, and idle entries only leave the table through LRU eviction.
//! Entries live in an LRU capped at 500 identities, so
//! memory stays bounded no matter how many distinct addresses show up; the least recently seen
//! client is dropped silently when a new one arrives at capacity.
//!
//! Rejected requests are not counted. A throttled client does not push its own window forward
//! by retrying, and the count always equals the number of admitted requests.
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

pub const MAX_REQUESTS_PER_WINDOW: u32 = 5;
pub const WINDOW: Duration = Duration::from_secs(60);
pub const MAX_TRACKED_CLIENTS: NonZeroUsize = match NonZeroUsize::new(500) {
    Some(n) => n,
    None => unreachable!(),
};

#[derive(Debug, Clone, Copy)]
struct RateLimitEntry {
    count: u32,
    window_start: Instant,
}

impl RateLimitEntry {
    fn starting_at(now: Instant) -> Self {
        Self {
            count: 0,
            window_start: now,
        }
    }

    fn window_elapsed(&self, now: Instant, window: Duration) -> bool {
        now.duration_since(self.window_start) > window
    }

    fn try_admit(&mut self, limit: u32) -> bool {
        if self.count >= limit {
            return false;
        }
        self.count += 1;
        true
    }
}

/// Shared, cheaply cloneable limiter. The table is only ever touched inside
/// [`RateLimiter::check_and_increment`], under one lock that is never held across an await.
#[derive(Clone)]
pub struct RateLimiter {
    entries: Arc<Mutex<LruCache<String, RateLimitEntry>>>,
    limit: u32,
    window: Duration,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_limits(MAX_REQUESTS_PER_WINDOW, WINDOW, MAX_TRACKED_CLIENTS)
    }

    pub(crate) fn with_limits(limit: u32, window: Duration, capacity: NonZeroUsize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(LruCache::new(capacity))),
            limit,
            window,
        }
    }

    /// Admits or rejects one request from `identity`, counting it only if admitted.
    pub fn check_and_increment(&self, identity: &str) -> bool {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(entry) = entries.get_mut(identity) {
            if entry.window_elapsed(now, self.window) {
                *entry = RateLimitEntry::starting_at(now);
            }
            let allowed = entry.try_admit(self.limit);
            debug!(
                identity,
                count = entry.count,
                allowed,
                "Rate limit checked"
            );
            return allowed;
        }

        let mut entry = RateLimitEntry::starting_at(now);
        let allowed = entry.try_admit(self.limit);
        if let Some((evicted, _)) = entries.push(identity.to_owned(), entry) {
            debug!(evicted = %evicted, "Rate limit table full, evicted least recently seen client");
        }
        allowed
    }

    /// Number of identities currently held in the table.
    pub fn tracked_clients(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("limit", &self.limit)
            .field("window", &self.window)
            .field("tracked_clients", &self.tracked_clients())
            .finish()
    }
}
