//! Token-bucket rate limiting per userId, gating moves/chat/game-create
//! per §4.6. No rate-limiting crate appears anywhere in the pack for this
//! concern, so this follows the same in-process `Mutex<HashMap>` shape as
//! [`crate::cache::LobbyCache`] rather than reaching for one.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// One bucket per `(userId, kind)`. Capacity and refill rate are derived
/// from a `max per window` spec (e.g. 30/min becomes a bucket of capacity
/// 30 that refills 30 tokens every 60s, continuously).
pub struct RateLimiter {
    capacity: f64,
    refill_per_sec: f64,
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl RateLimiter {
    pub fn new(max_events: u32, window: Duration) -> Self {
        let capacity = max_events as f64;
        Self {
            capacity,
            refill_per_sec: capacity / window.as_secs_f64(),
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Consumes one token for `key` (e.g. a userId, or `"{userId}:{gameId}"`
    /// for a per-game limit). Returns `false` — and consumes nothing — if
    /// the bucket is empty.
    pub fn try_acquire(&self, key: &str) -> bool {
        let mut buckets = self.buckets.lock().unwrap();
        let bucket = buckets.entry(key.to_string()).or_insert_with(|| Bucket {
            tokens: self.capacity,
            last_refill: Instant::now(),
        });

        let elapsed = bucket.last_refill.elapsed().as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        bucket.last_refill = Instant::now();

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_capacity_then_rejects() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        assert!(limiter.try_acquire("alice"));
        assert!(limiter.try_acquire("alice"));
        assert!(limiter.try_acquire("alice"));
        assert!(!limiter.try_acquire("alice"));
    }

    #[test]
    fn buckets_are_independent_per_key() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        assert!(limiter.try_acquire("alice"));
        assert!(limiter.try_acquire("bob"));
        assert!(!limiter.try_acquire("alice"));
    }

    #[test]
    fn refills_over_time() {
        let limiter = RateLimiter::new(1, Duration::from_millis(10));
        assert!(limiter.try_acquire("alice"));
        assert!(!limiter.try_acquire("alice"));
        std::thread::sleep(Duration::from_millis(15));
        assert!(limiter.try_acquire("alice"));
    }
}
