//! Re-exports the working set for embedding the gateway.
//!
//! # Example
//! ```rust,no_run
//! use booking_gateway::prelude::*;
//! ```

pub use crate::breaker::CircuitBreaker;
pub use crate::config::{BreakerBuilder, GatewayBuilder};
pub use crate::dispatcher::{Admission, AdmissionDispatcher, Booking, BookingService, RejectionCause};
pub use crate::error::{BreakerError, CapacityExceeded, CreationError, PublishError};
pub use crate::fault::{FaultBroadcaster, FaultEvent, FaultPublisher};
pub use crate::limiter::{CapacityRejection, ConsumeGrant, TokenBucketLimiter};
pub use crate::state::State;
