//! Core circuit breaker implementation.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::error::{BreakerError, BreakerResult};
use crate::hook::HookRegistry;
use crate::metrics::{BreakerStats, MetricSink};
use crate::policy::TripPolicy;
use crate::state::{State, StateManager};

/// Shared state behind every clone of a breaker.
struct BreakerInner<P>
where
    P: TripPolicy,
{
    state: StateManager,
    policy: P,
    stats: BreakerStats,
    call_timeout: Duration,
    reset_timeout: Duration,
    trial_permit: AtomicU32,
    sink: Arc<dyn MetricSink>,
    hooks: Arc<HookRegistry>,
}

/// Circuit breaker wrapping an async guarded operation.
///
/// The breaker only understands "returned `Ok`" versus "returned `Err` or
/// timed out". A limiter refusal is a plain value, so the guarded operation
/// must promote it to a [`CapacityExceeded`](crate::CapacityExceeded) error
/// for the refusal to count toward the failure ratio; the dispatcher's
/// wiring does exactly that.
pub struct CircuitBreaker<P, E>
where
    P: TripPolicy,
    E: std::error::Error + 'static,
{
    inner: Arc<BreakerInner<P>>,
    _error_type: std::marker::PhantomData<E>,
}

impl<P, E> CircuitBreaker<P, E>
where
    P: TripPolicy,
    E: std::error::Error + 'static,
{
    /// Creates a breaker from its parts. Most callers go through
    /// [`builder`](Self::builder) instead.
    pub fn new(
        policy: P,
        call_timeout: Duration,
        reset_timeout: Duration,
        stats: BreakerStats,
        sink: Arc<dyn MetricSink>,
        hooks: Arc<HookRegistry>,
    ) -> Self {
        let inner = BreakerInner {
            state: StateManager::new(),
            policy,
            stats,
            call_timeout,
            reset_timeout,
            trial_permit: AtomicU32::new(0),
            sink,
            hooks,
        };

        Self {
            inner: Arc::new(inner),
            _error_type: std::marker::PhantomData,
        }
    }

    /// Builder with the default error-rate policy.
    pub fn builder() -> crate::config::BreakerBuilder<crate::policy::ErrorRatePolicy, E> {
        crate::config::BreakerBuilder::new()
    }

    /// Current state.
    pub fn current_state(&self) -> State {
        self.inner.state.current()
    }

    /// Failure ratio over the rolling statistics window.
    pub fn error_rate(&self) -> f64 {
        self.inner.stats.error_rate()
    }

    /// Guarded calls completed since the breaker last closed.
    pub fn fire_count(&self) -> u64 {
        self.inner.stats.fire_count()
    }

    /// Failed guarded calls since the breaker last closed.
    pub fn failure_count(&self) -> u64 {
        self.inner.stats.failure_count()
    }

    /// Transition observers. The fault broadcaster registers itself here.
    pub fn hooks(&self) -> &HookRegistry {
        &self.inner.hooks
    }

    /// Runs `f` under the breaker.
    ///
    /// Short-circuits with [`BreakerError::Open`] while open; otherwise the
    /// operation runs bounded by the call timeout. A call that outlives the
    /// timeout is dropped and accounted as a failure. Every completed call
    /// updates the failure statistics and may transition the breaker,
    /// notifying observers.
    pub async fn guard<F, Fut, T>(&self, f: F) -> BreakerResult<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.pre_call()?;

        let start = Instant::now();
        match tokio::time::timeout(self.inner.call_timeout, f()).await {
            Ok(result) => {
                self.post_call(result.is_ok(), start.elapsed());
                result.map_err(BreakerError::Operation)
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.inner.call_timeout.as_millis() as u64,
                    "guarded call timed out"
                );
                self.post_call(false, start.elapsed());
                Err(BreakerError::Timeout(self.inner.call_timeout))
            }
        }
    }

    /// Admission check before invoking the guarded operation.
    fn pre_call(&self) -> Result<(), BreakerError<E>> {
        match self.inner.state.current() {
            State::Closed => Ok(()),
            State::Open => {
                if self.inner.state.time_in_state() >= self.inner.reset_timeout
                    && self.inner.state.attempt_half_open()
                {
                    // Exactly one trial slot; this caller races for it below
                    // like anyone else arriving in half-open.
                    self.inner.trial_permit.store(1, Ordering::Release);
                    self.announce_transition(State::Open, State::HalfOpen);
                    return self.take_trial();
                }

                Err(BreakerError::Open)
            }
            State::HalfOpen => self.take_trial(),
        }
    }

    /// Claims the half-open trial slot, if still free.
    fn take_trial(&self) -> Result<(), BreakerError<E>> {
        let granted = self
            .inner
            .trial_permit
            .compare_exchange(1, 0, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();

        self.inner.sink.record_trial(granted);

        if granted {
            Ok(())
        } else {
            Err(BreakerError::Open)
        }
    }

    /// Records the outcome of a completed call and applies any resulting
    /// transition.
    fn post_call(&self, success: bool, duration: Duration) {
        let state = self.inner.state.current();

        self.inner.sink.record_call(success, duration);
        self.inner.stats.record_call(success);

        if success {
            if state == State::HalfOpen && self.inner.state.reset_closed() {
                self.inner.stats.reset();
                self.announce_transition(State::HalfOpen, State::Closed);
            }
            return;
        }

        match state {
            State::HalfOpen => {
                if self.inner.state.revert_to_open() {
                    self.announce_transition(State::HalfOpen, State::Open);
                }
            }
            State::Closed => {
                if self.inner.policy.should_trip(&self.inner.stats)
                    && self.inner.state.trip_open()
                {
                    self.inner
                        .sink
                        .record_error_rate(self.inner.stats.error_rate());
                    self.announce_transition(State::Closed, State::Open);
                }
            }
            State::Open => {}
        }
    }

    /// Forces the breaker open, e.g. for maintenance. Fires the same
    /// transition events as an organic trip.
    pub fn force_open(&self) -> bool {
        let from = self.inner.state.current();
        if from == State::Open {
            return false;
        }

        let tripped = self.inner.state.trip_open();
        if tripped {
            self.announce_transition(from, State::Open);
        }

        tripped
    }

    /// Forces the breaker closed, resetting its statistics.
    pub fn force_closed(&self) -> bool {
        let from = self.inner.state.current();
        let closed = match from {
            State::Open => self.inner.state.transition(State::Open, State::Closed),
            State::HalfOpen => self.inner.state.reset_closed(),
            State::Closed => false,
        };

        if closed {
            self.inner.stats.reset();
            self.announce_transition(from, State::Closed);
        }

        closed
    }

    /// Hook and metric dispatch for a transition this caller won. Runs
    /// outside the state manager's lock path.
    fn announce_transition(&self, from: State, to: State) {
        match to {
            State::Open => warn!(from = from.as_str(), "circuit opened"),
            State::HalfOpen => info!("circuit half-open, admitting one trial call"),
            State::Closed => info!(from = from.as_str(), "circuit closed"),
        }

        self.inner.hooks.notify(to);
        self.inner.sink.record_state_transition(from, to);
    }
}

// Clones share the same breaker; inner state is Arc'd.
impl<P, E> Clone for CircuitBreaker<P, E>
where
    P: TripPolicy,
    E: std::error::Error + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            _error_type: std::marker::PhantomData,
        }
    }
}
