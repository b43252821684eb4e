//! Error taxonomy for the gateway.
//!
//! The one load-bearing asymmetry: a limiter refusal
//! ([`CapacityRejection`](crate::CapacityRejection)) is a plain value, not
//! an error. It only becomes an error, [`CapacityExceeded`], when the
//! dispatcher's guarded operation promotes it so the breaker's failure
//! accounting can see it. The dispatcher later matches on that tagged form
//! to re-admit the request that tripped the breaker.

use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::time::Duration;

use crate::limiter::CapacityRejection;

/// Result of a breaker-guarded call.
pub type BreakerResult<T, E> = Result<T, BreakerError<E>>;

/// Ways a breaker-guarded call can fail.
#[derive(Debug)]
pub enum BreakerError<E> {
    /// The breaker is open; the guarded operation was never invoked.
    Open,

    /// The guarded operation did not complete within the call timeout.
    /// The pending future was dropped; it counts as a failure regardless of
    /// how it would have resolved.
    Timeout(Duration),

    /// The guarded operation itself returned an error.
    Operation(E),
}

impl<E> Display for BreakerError<E>
where
    E: Display,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            BreakerError::Open => write!(f, "circuit breaker is open"),
            BreakerError::Timeout(limit) => {
                write!(f, "guarded call exceeded timeout of {limit:?}")
            }
            BreakerError::Operation(e) => write!(f, "guarded operation failed: {e}"),
        }
    }
}

impl<E: Error + 'static> Error for BreakerError<E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            BreakerError::Operation(e) => Some(e),
            _ => None,
        }
    }
}

/// A limiter refusal promoted to an error.
///
/// This is the value the dispatcher's guarded operation raises in place of
/// the plain [`CapacityRejection`], so the breaker counts the refusal toward
/// its failure ratio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapacityExceeded(
    /// The underlying limiter refusal.
    pub CapacityRejection,
);

impl Display for CapacityExceeded {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "capacity exhausted, next point in {:?}",
            self.0.retry_after
        )
    }
}

impl Error for CapacityExceeded {}

/// Failure reported by a [`FaultPublisher`](crate::FaultPublisher).
///
/// Fault publication is best-effort; these are logged and dropped.
#[derive(Debug)]
pub struct PublishError {
    /// Topic the publish was aimed at.
    pub topic: String,
    /// Publisher-provided reason.
    pub reason: String,
}

impl Display for PublishError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "failed to publish to '{}': {}", self.topic, self.reason)
    }
}

impl Error for PublishError {}

/// Failure from the downstream booking-creation collaborator.
///
/// Terminal for the single request it belongs to; admission has already
/// happened and neither breaker nor limiter state is touched.
#[derive(Debug)]
pub struct CreationError(
    /// Collaborator-provided reason.
    pub String,
);

impl Display for CreationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "booking creation failed: {}", self.0)
    }
}

impl Error for CreationError {}
