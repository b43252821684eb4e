//! Failure accounting and the metric sink seam.

use parking_lot::Mutex;
use smallvec::SmallVec;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::state::State;

/// Receives breaker events for export to an observability backend.
pub trait MetricSink: Send + Sync + 'static {
    /// A state transition happened.
    fn record_state_transition(&self, from: State, to: State);

    /// The rolling error rate at the moment the breaker tripped.
    fn record_error_rate(&self, rate: f64);

    /// A half-open trial was requested; `permitted` is whether it got the
    /// trial slot.
    fn record_trial(&self, permitted: bool);

    /// A guarded call completed (or timed out).
    fn record_call(&self, success: bool, duration: Duration);
}

/// Sink that discards everything.
pub struct NullMetricSink;

impl MetricSink for NullMetricSink {
    fn record_state_transition(&self, _from: State, _to: State) {}
    fn record_error_rate(&self, _rate: f64) {}
    fn record_trial(&self, _permitted: bool) {}
    fn record_call(&self, _success: bool, _duration: Duration) {}
}

/// One slice of the rolling statistics window.
#[derive(Clone, Copy)]
struct StatsBucket {
    started: Instant,
    fires: u64,
    failures: u64,
}

/// Fire and failure accounting for one breaker.
///
/// Two views over the same calls: cumulative fire/failure counters (reset
/// when the breaker closes after a successful trial) and a rolling window of
/// time-sliced buckets that the trip policy evaluates, so stale failures age
/// out of the ratio.
pub struct BreakerStats {
    fire_count: AtomicU64,
    failure_count: AtomicU64,
    window: Mutex<SmallVec<[StatsBucket; 16]>>,
    window_size: Duration,
    slice: Duration,
}

impl BreakerStats {
    /// Creates a tracker with the given rolling window sliced into
    /// `bucket_count` pieces.
    pub fn new(window_size: Duration, bucket_count: usize) -> Self {
        let slice = window_size / bucket_count.max(1) as u32;
        Self {
            fire_count: AtomicU64::new(0),
            failure_count: AtomicU64::new(0),
            window: Mutex::new(SmallVec::new()),
            window_size,
            slice,
        }
    }

    /// Records one completed guarded call.
    pub fn record_call(&self, success: bool) {
        self.fire_count.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.failure_count.fetch_add(1, Ordering::Relaxed);
        }

        let mut window = self.window.lock();
        self.drop_stale(&mut window);

        let now = Instant::now();
        let failed = u64::from(!success);
        if let Some(bucket) = window.last_mut() {
            if now.duration_since(bucket.started) < self.slice {
                bucket.fires += 1;
                bucket.failures += failed;
                return;
            }
        }

        window.push(StatsBucket {
            started: now,
            fires: 1,
            failures: failed,
        });
    }

    /// Cumulative calls since the last reset.
    pub fn fire_count(&self) -> u64 {
        self.fire_count.load(Ordering::Relaxed)
    }

    /// Cumulative failures since the last reset.
    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    /// Calls currently inside the rolling window.
    pub fn window_fires(&self) -> u64 {
        let mut window = self.window.lock();
        self.drop_stale(&mut window);
        window.iter().map(|b| b.fires).sum()
    }

    /// Failure ratio over the rolling window; 0.0 when no calls are in it.
    pub fn error_rate(&self) -> f64 {
        let mut window = self.window.lock();
        self.drop_stale(&mut window);

        let (fires, failures) = window
            .iter()
            .fold((0u64, 0u64), |(c, f), b| (c + b.fires, f + b.failures));

        if fires == 0 {
            return 0.0;
        }

        failures as f64 / fires as f64
    }

    /// Clears both views. Called when the breaker closes.
    pub fn reset(&self) {
        self.fire_count.store(0, Ordering::Relaxed);
        self.failure_count.store(0, Ordering::Relaxed);
        self.window.lock().clear();
    }

    fn drop_stale(&self, window: &mut SmallVec<[StatsBucket; 16]>) {
        let cutoff = match Instant::now().checked_sub(self.window_size) {
            Some(cutoff) => cutoff,
            None => return,
        };

        while let Some(bucket) = window.first() {
            if bucket.started < cutoff {
                window.remove(0);
            } else {
                break;
            }
        }
    }
}
