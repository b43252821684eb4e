//! Per-key token-bucket limiter.
//!
//! Tracks consumption of points per key within a fixed-size window that
//! resets lazily on the first call after expiry. A refusal is returned as a
//! plain [`CapacityRejection`] value rather than an error: the dispatcher
//! relies on that distinction to tell "the limiter declined" apart from
//! "the guarded call failed".

use ahash::RandomState;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Successful consumption: how much headroom is left and when the window
/// rolls over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsumeGrant {
    /// Points still available in the current window.
    pub remaining: u32,
    /// Time until the window resets.
    pub resets_in: Duration,
}

/// The limiter declined the requested points.
///
/// Deliberately not a [`std::error::Error`]: this is a capacity verdict, not
/// a failure. The guarded-call wiring promotes it to
/// [`CapacityExceeded`](crate::CapacityExceeded) when the breaker needs to
/// count it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityRejection {
    /// Time until the next point becomes available (the window reset).
    pub retry_after: Duration,
}

struct Bucket {
    consumed: u32,
    window_start: Instant,
}

/// Token-bucket limiter with one bucket per key.
///
/// Buckets are created lazily on first consumption and never implicitly
/// destroyed; call [`purge_idle`](Self::purge_idle) to drop buckets whose
/// window has expired. All bucket mutation happens under one mutex so that
/// concurrent consumers cannot lose updates.
pub struct TokenBucketLimiter {
    capacity: u32,
    window: Duration,
    buckets: Mutex<HashMap<String, Bucket, RandomState>>,
}

impl TokenBucketLimiter {
    /// Creates a limiter granting up to `capacity` points per `window` for
    /// each key.
    pub fn new(capacity: u32, window: Duration) -> Self {
        Self {
            capacity,
            window,
            buckets: Mutex::new(HashMap::default()),
        }
    }

    /// Configured points per window.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Configured window length.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Consumes `cost` points for `key` within the current window.
    ///
    /// Resets the bucket first if its window has expired. On refusal the
    /// bucket is left untouched and the rejection carries the time until the
    /// window rolls over.
    pub fn consume(&self, key: &str, cost: u32) -> Result<ConsumeGrant, CapacityRejection> {
        let mut buckets = self.buckets.lock();
        let now = Instant::now();

        let bucket = buckets.entry(key.to_owned()).or_insert(Bucket {
            consumed: 0,
            window_start: now,
        });

        if now.duration_since(bucket.window_start) >= self.window {
            bucket.consumed = 0;
            bucket.window_start = now;
        }

        let resets_in = self
            .window
            .saturating_sub(now.duration_since(bucket.window_start));

        if bucket.consumed.saturating_add(cost) <= self.capacity {
            bucket.consumed += cost;
            Ok(ConsumeGrant {
                remaining: self.capacity - bucket.consumed,
                resets_in,
            })
        } else {
            Err(CapacityRejection {
                retry_after: resets_in,
            })
        }
    }

    /// Points still available for `key`, without consuming any.
    ///
    /// A missing or expired bucket reports full capacity. Never mutates the
    /// table, so it is safe to probe from tests and health checks.
    pub fn remaining(&self, key: &str) -> u32 {
        let buckets = self.buckets.lock();
        match buckets.get(key) {
            Some(bucket) if bucket.window_start.elapsed() < self.window => {
                self.capacity.saturating_sub(bucket.consumed)
            }
            _ => self.capacity,
        }
    }

    /// Drops buckets whose window has expired, returning how many were
    /// removed. Cadence is up to the caller; consumption is correct without
    /// ever sweeping.
    pub fn purge_idle(&self) -> usize {
        let mut buckets = self.buckets.lock();
        let before = buckets.len();
        buckets.retain(|_, bucket| bucket.window_start.elapsed() < self.window);
        before - buckets.len()
    }
}
