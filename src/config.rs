//! Builders for the breaker and the fully wired gateway.
//!
//! All knobs are constants supplied by the embedding process; nothing here
//! reads files or the environment.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use crate::breaker::CircuitBreaker;
use crate::dispatcher::{AdmissionDispatcher, BookingService};
use crate::error::CapacityExceeded;
use crate::fault::{FaultBroadcaster, FaultPublisher};
use crate::hook::HookRegistry;
use crate::limiter::TokenBucketLimiter;
use crate::metrics::{BreakerStats, MetricSink, NullMetricSink};
use crate::policy::{ErrorRatePolicy, TripPolicy};

/// Builder for a standalone circuit breaker.
pub struct BreakerBuilder<P, E>
where
    P: TripPolicy,
    E: std::error::Error + 'static,
{
    error_threshold: f64,
    min_fires: u64,
    stats_window: Duration,
    stats_buckets: usize,
    call_timeout: Duration,
    reset_timeout: Duration,
    policy: Option<P>,
    sink: Arc<dyn MetricSink>,
    hooks: Arc<HookRegistry>,
    _error_type: PhantomData<E>,
}

impl<E> Default for BreakerBuilder<ErrorRatePolicy, E>
where
    E: std::error::Error + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<E> BreakerBuilder<ErrorRatePolicy, E>
where
    E: std::error::Error + 'static,
{
    /// Builder with the default settings: trip at a 50% rolling failure
    /// ratio, 10 s statistics window, 5 s call timeout, 10 s reset timeout.
    pub fn new() -> Self {
        Self {
            error_threshold: 0.5,
            min_fires: 1,
            stats_window: Duration::from_secs(10),
            stats_buckets: 10,
            call_timeout: Duration::from_millis(5000),
            reset_timeout: Duration::from_millis(10_000),
            policy: None,
            sink: Arc::new(NullMetricSink),
            hooks: Arc::new(HookRegistry::new()),
            _error_type: PhantomData,
        }
    }

    /// Builds with the error-rate policy assembled from the configured
    /// threshold and minimum fire count.
    pub fn build(self) -> CircuitBreaker<ErrorRatePolicy, E> {
        let policy = ErrorRatePolicy::new(self.error_threshold, self.min_fires);
        let stats = BreakerStats::new(self.stats_window, self.stats_buckets);

        CircuitBreaker::new(
            policy,
            self.call_timeout,
            self.reset_timeout,
            stats,
            self.sink,
            self.hooks,
        )
    }
}

impl<P, E> BreakerBuilder<P, E>
where
    P: TripPolicy,
    E: std::error::Error + 'static,
{
    /// Failure ratio in `[0, 1]` that trips the circuit.
    pub fn error_threshold(mut self, threshold: f64) -> Self {
        self.error_threshold = threshold;
        self
    }

    /// Minimum calls in the rolling window before the ratio is considered.
    pub fn min_fires(mut self, min_fires: u64) -> Self {
        self.min_fires = min_fires;
        self
    }

    /// Rolling statistics window and its bucket count.
    pub fn stats_window(mut self, window: Duration, buckets: usize) -> Self {
        self.stats_window = window;
        self.stats_buckets = buckets;
        self
    }

    /// Upper bound on a single guarded call; exceeding it is a failure.
    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Time spent open before the next call becomes a half-open trial.
    pub fn reset_timeout(mut self, timeout: Duration) -> Self {
        self.reset_timeout = timeout;
        self
    }

    /// Custom trip policy, replacing the error-rate default.
    pub fn policy(mut self, policy: P) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Metric sink receiving breaker events.
    pub fn metric_sink<M: MetricSink>(mut self, sink: M) -> Self {
        self.sink = Arc::new(sink);
        self
    }

    /// Pre-populated transition observers.
    pub fn hooks(mut self, hooks: HookRegistry) -> Self {
        self.hooks = Arc::new(hooks);
        self
    }

    /// Builds with an explicitly supplied policy.
    ///
    /// # Panics
    /// If no policy was set; use [`BreakerBuilder::build`] for the
    /// error-rate default.
    pub fn build_with_policy(self) -> CircuitBreaker<P, E> {
        let stats = BreakerStats::new(self.stats_window, self.stats_buckets);

        match self.policy {
            Some(policy) => CircuitBreaker::new(
                policy,
                self.call_timeout,
                self.reset_timeout,
                stats,
                self.sink,
                self.hooks,
            ),
            None => panic!("policy must be provided when not using ErrorRatePolicy"),
        }
    }
}

/// Builder for the fully wired admission gateway: limiter, breaker, fault
/// broadcaster, and dispatcher.
pub struct GatewayBuilder {
    capacity: u32,
    window: Duration,
    admission_key: String,
    fault_topic: String,
    breaker: BreakerBuilder<ErrorRatePolicy, CapacityExceeded>,
}

impl Default for GatewayBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GatewayBuilder {
    /// Builder with the default limiter shape (100 points per second) and
    /// default breaker settings.
    pub fn new() -> Self {
        Self {
            capacity: 100,
            window: Duration::from_secs(1),
            admission_key: "bookings".to_owned(),
            fault_topic: "bookings/circuit-fault".to_owned(),
            breaker: BreakerBuilder::new(),
        }
    }

    /// Points each key may consume per window.
    pub fn capacity(mut self, capacity: u32) -> Self {
        self.capacity = capacity;
        self
    }

    /// Limiter window length.
    pub fn window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Limiter key the booking write path consumes against.
    pub fn admission_key(mut self, key: impl Into<String>) -> Self {
        self.admission_key = key.into();
        self
    }

    /// Topic the fault broadcaster publishes breaker health on.
    pub fn fault_topic(mut self, topic: impl Into<String>) -> Self {
        self.fault_topic = topic.into();
        self
    }

    /// See [`BreakerBuilder::error_threshold`].
    pub fn error_threshold(mut self, threshold: f64) -> Self {
        self.breaker = self.breaker.error_threshold(threshold);
        self
    }

    /// See [`BreakerBuilder::min_fires`].
    pub fn min_fires(mut self, min_fires: u64) -> Self {
        self.breaker = self.breaker.min_fires(min_fires);
        self
    }

    /// See [`BreakerBuilder::stats_window`].
    pub fn stats_window(mut self, window: Duration, buckets: usize) -> Self {
        self.breaker = self.breaker.stats_window(window, buckets);
        self
    }

    /// See [`BreakerBuilder::call_timeout`].
    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.breaker = self.breaker.call_timeout(timeout);
        self
    }

    /// See [`BreakerBuilder::reset_timeout`].
    pub fn reset_timeout(mut self, timeout: Duration) -> Self {
        self.breaker = self.breaker.reset_timeout(timeout);
        self
    }

    /// See [`BreakerBuilder::metric_sink`].
    pub fn metric_sink<M: MetricSink>(mut self, sink: M) -> Self {
        self.breaker = self.breaker.metric_sink(sink);
        self
    }

    /// Wires everything together around the two external collaborators.
    ///
    /// The broadcaster is attached to the breaker's transition hooks before
    /// the dispatcher ever sees a request, so no transition can be missed.
    pub fn build(
        self,
        bookings: Arc<dyn BookingService>,
        publisher: Arc<dyn FaultPublisher>,
    ) -> AdmissionDispatcher<ErrorRatePolicy> {
        let breaker = self.breaker.build();

        let broadcaster = FaultBroadcaster::new(self.fault_topic, publisher);
        broadcaster.attach(&breaker);

        let limiter = Arc::new(TokenBucketLimiter::new(self.capacity, self.window));

        AdmissionDispatcher::new(breaker, limiter, bookings, self.admission_key)
    }
}
