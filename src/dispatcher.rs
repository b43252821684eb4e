//! Admission policy for the booking write path.
//!
//! The dispatcher runs the limiter check through the breaker and maps the
//! tagged outcome to an admission decision. The one non-obvious rule: the
//! request whose limiter refusal drives the breaker over its threshold is
//! itself still admitted. The refusal reaches the breaker as a
//! [`CapacityExceeded`] error so it counts toward the failure ratio, and the
//! dispatcher re-admits it by matching that exact error, never by
//! inspecting error types at runtime.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::breaker::CircuitBreaker;
use crate::envelope::Envelope;
use crate::error::{BreakerError, CapacityExceeded, CreationError};
use crate::limiter::TokenBucketLimiter;
use crate::policy::TripPolicy;

/// Receipt from the downstream collaborator for a created booking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Booking {
    /// Caller-supplied booking code, echoed back on creation.
    pub code: String,
}

/// The external booking-creation collaborator.
///
/// Validation, persistence, and scheduling rules all live behind this seam;
/// the dispatcher passes `data` through without interpreting it.
#[async_trait]
pub trait BookingService: Send + Sync {
    /// Creates a booking from the opaque request data.
    async fn create_booking(&self, data: Value) -> Result<Booking, CreationError>;
}

/// Admission decision for one inbound create request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The limiter had capacity; the request was forwarded.
    Accepted {
        /// Points left in the window after this request.
        remaining: u32,
    },

    /// The limiter declined, but this is the declining request itself, so
    /// it was forwarded anyway (and the breaker may have opened as a side
    /// effect).
    AcceptedAtCapacity {
        /// Time until the limiter window resets.
        retry_after: Duration,
    },

    /// Not forwarded.
    Rejected(RejectionCause),
}

/// Why a request was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionCause {
    /// The breaker short-circuited the admission check; the limiter was
    /// never consulted.
    BreakerOpen,

    /// The admission check itself exceeded the breaker's call timeout.
    CheckTimeout,
}

/// Orchestrates breaker, limiter, and the downstream collaborator.
///
/// Owns neither the breaker state nor the bucket table; it only invokes the
/// guarded check and interprets the outcome.
pub struct AdmissionDispatcher<P>
where
    P: TripPolicy,
{
    breaker: CircuitBreaker<P, CapacityExceeded>,
    limiter: Arc<TokenBucketLimiter>,
    bookings: Arc<dyn BookingService>,
    admission_key: String,
}

impl<P> AdmissionDispatcher<P>
where
    P: TripPolicy,
{
    /// Wires a dispatcher. `admission_key` is the limiter key the booking
    /// write path consumes against.
    pub fn new(
        breaker: CircuitBreaker<P, CapacityExceeded>,
        limiter: Arc<TokenBucketLimiter>,
        bookings: Arc<dyn BookingService>,
        admission_key: impl Into<String>,
    ) -> Self {
        Self {
            breaker,
            limiter,
            bookings,
            admission_key: admission_key.into(),
        }
    }

    /// Decides whether one create request is admitted, forwarding it
    /// downstream if so.
    ///
    /// Forwarding is fire-and-forget as far as admission is concerned: a
    /// downstream failure is logged and changes neither breaker nor limiter
    /// state.
    pub async fn admit(&self, data: Value) -> Admission {
        let limiter = Arc::clone(&self.limiter);
        let key = self.admission_key.clone();

        let outcome = self
            .breaker
            .guard(move || async move { limiter.consume(&key, 1).map_err(CapacityExceeded) })
            .await;

        match outcome {
            Ok(grant) => {
                info!(remaining = grant.remaining, "create request accepted");
                self.forward(data).await;
                Admission::Accepted {
                    remaining: grant.remaining,
                }
            }
            Err(BreakerError::Operation(CapacityExceeded(rejection))) => {
                // The request that exhausts capacity still rides through,
                // even though its failure may have just opened the circuit.
                info!(
                    retry_after_ms = rejection.retry_after.as_millis() as u64,
                    "create request accepted at capacity"
                );
                self.forward(data).await;
                Admission::AcceptedAtCapacity {
                    retry_after: rejection.retry_after,
                }
            }
            Err(BreakerError::Open) => {
                warn!("create request rejected, circuit open");
                Admission::Rejected(RejectionCause::BreakerOpen)
            }
            Err(BreakerError::Timeout(limit)) => {
                warn!(
                    timeout_ms = limit.as_millis() as u64,
                    "create request rejected, admission check timed out"
                );
                Admission::Rejected(RejectionCause::CheckTimeout)
            }
        }
    }

    /// Parses an inbound envelope and routes it.
    ///
    /// Only `"create"` reaches [`admit`](Self::admit); malformed payloads
    /// and unrecognized methods are logged and dropped, returning `None`.
    pub async fn handle_message(&self, payload: &[u8]) -> Option<Admission> {
        let envelope = match Envelope::parse(payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                error!(error = %e, "dropping malformed envelope");
                return None;
            }
        };

        match envelope.method.as_str() {
            "create" => Some(self.admit(envelope.data).await),
            method => {
                error!(method, "unsupported method");
                None
            }
        }
    }

    /// The breaker guarding this dispatcher.
    pub fn breaker(&self) -> &CircuitBreaker<P, CapacityExceeded> {
        &self.breaker
    }

    /// The limiter consulted by the guarded check.
    pub fn limiter(&self) -> &TokenBucketLimiter {
        &self.limiter
    }

    async fn forward(&self, data: Value) {
        match self.bookings.create_booking(data).await {
            Ok(booking) => info!(code = %booking.code, "booking created"),
            Err(e) => error!(error = %e, "booking creation failed"),
        }
    }
}
