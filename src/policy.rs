//! Trip decision for the circuit breaker.

use crate::metrics::BreakerStats;

/// Decides when the breaker should trip open.
///
/// Closing is not a policy question here: a half-open trial that succeeds
/// always closes the breaker.
pub trait TripPolicy: Send + Sync + 'static {
    /// Whether the circuit should open given the current stats.
    fn should_trip(&self, stats: &BreakerStats) -> bool;
}

/// Trips when the rolling failure ratio reaches a threshold.
///
/// `min_fires` guards against tripping on a near-empty window; with the
/// default of 1 a single failing call can open the circuit when the
/// threshold allows it.
pub struct ErrorRatePolicy {
    error_threshold: f64,
    min_fires: u64,
}

impl ErrorRatePolicy {
    /// Creates a policy tripping at `error_threshold` (a fraction in
    /// `[0, 1]`) once at least `min_fires` calls sit in the rolling window.
    pub fn new(error_threshold: f64, min_fires: u64) -> Self {
        Self {
            error_threshold: error_threshold.clamp(0.0, 1.0),
            min_fires: min_fires.max(1),
        }
    }
}

impl TripPolicy for ErrorRatePolicy {
    fn should_trip(&self, stats: &BreakerStats) -> bool {
        stats.window_fires() >= self.min_fires && stats.error_rate() >= self.error_threshold
    }
}
