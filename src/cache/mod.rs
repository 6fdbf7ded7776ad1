//! TTL-bounded snapshot caching.
//!
//! Each cache owns a single shared slot that is replaced wholesale on every
//! successful refresh; there is no partial merge and no eviction. A failed
//! refresh is logged and the previous (possibly stale) value is handed back,
//! so callers only ever see "fresh data", "stale data", or "no data".
//!
//! Concurrency model: the fetch runs outside the lock, so two logical callers
//! that both observe an expired slot will both fetch, and the later
//! completion wins. That imprecision is accepted; the cache only promises
//! "at most one fetch per TTL window per caller chain", not coalescing.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Time source, injected so expiry is testable without sleeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall-clock backed `Clock` used outside of tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

struct Slot<T> {
    value: T,
    fetched_at: Instant,
}

/// Single-slot cache with a fixed time-to-live.
pub struct TtlCache<T> {
    slot: Mutex<Option<Slot<T>>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<T: Clone> TtlCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            slot: Mutex::new(None),
            ttl,
            clock,
        }
    }

    /// Return the cached value if it is younger than the TTL, otherwise run
    /// `fetch` and replace the slot. On fetch failure the previous value is
    /// returned unchanged (or `None` if the cache was never populated);
    /// failures never propagate to the caller.
    pub async fn get_or_refresh<F, Fut, E>(&self, label: &str, fetch: F) -> Option<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        if let Some(value) = self.fresh() {
            return Some(value);
        }

        match fetch().await {
            Ok(value) => {
                let mut slot = self.slot.lock();
                *slot = Some(Slot {
                    value: value.clone(),
                    fetched_at: self.clock.now(),
                });
                Some(value)
            }
            Err(err) => {
                tracing::warn!(cache = label, error = %err, "refresh failed, serving stale data");
                self.slot.lock().as_ref().map(|slot| slot.value.clone())
            }
        }
    }

    /// Store a value directly, restarting the TTL window.
    pub fn put(&self, value: T) {
        *self.slot.lock() = Some(Slot {
            value,
            fetched_at: self.clock.now(),
        });
    }

    /// Cached value if still within the TTL; never fetches.
    pub fn fresh(&self) -> Option<T> {
        let slot = self.slot.lock();
        slot.as_ref().and_then(|slot| {
            let age = self.clock.now().saturating_duration_since(slot.fetched_at);
            (age < self.ttl).then(|| slot.value.clone())
        })
    }

    /// Age of the cached value, measured from the last successful fetch.
    pub fn age(&self) -> Option<Duration> {
        let slot = self.slot.lock();
        slot.as_ref()
            .map(|slot| self.clock.now().saturating_duration_since(slot.fetched_at))
    }
}
