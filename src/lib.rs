//! # booking-gateway
//!
//! Admission-control gateway protecting a booking-creation write path from
//! overload. A per-key token-bucket limiter is checked through a circuit
//! breaker; an admission dispatcher interprets the outcome; a fault
//! broadcaster mirrors breaker health to a pub/sub topic so other processes
//! know when to stop sending.
//!
//! ## How admission works
//!
//! Every inbound create request runs the limiter check as the breaker's
//! guarded operation. Three things can come back:
//!
//! - The limiter had capacity: the request is **accepted** and forwarded.
//! - The breaker was open: the request is **rejected** without the limiter
//!   ever being consulted.
//! - The limiter declined this specific request: the refusal is promoted to
//!   an error so the breaker's failure accounting sees it (and may open the
//!   circuit), but the request itself is **still accepted**. The request
//!   that trips the breaker rides through.
//!
//! The breaker runs the usual closed / open / half-open cycle: it opens when
//! the rolling failure ratio reaches the configured threshold, short-circuits
//! everything while open, and after the reset timeout admits exactly one
//! trial call whose outcome decides between closing and re-opening.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use async_trait::async_trait;
//! use booking_gateway::{
//!     Admission, Booking, BookingService, CreationError, FaultEvent, FaultPublisher,
//!     GatewayBuilder, PublishError,
//! };
//! use serde_json::json;
//!
//! // The booking domain lives behind this seam.
//! struct Bookings;
//!
//! #[async_trait]
//! impl BookingService for Bookings {
//!     async fn create_booking(&self, data: serde_json::Value) -> Result<Booking, CreationError> {
//!         let code = data["code"].as_str().unwrap_or_default().to_owned();
//!         Ok(Booking { code })
//!     }
//! }
//!
//! // Wrap whatever broker client the process uses.
//! struct Publisher;
//!
//! impl FaultPublisher for Publisher {
//!     fn publish(&self, _event: &FaultEvent) -> Result<(), PublishError> {
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let gateway = GatewayBuilder::new()
//!         .capacity(2)
//!         .window(Duration::from_secs(5))
//!         .error_threshold(0.001)
//!         .reset_timeout(Duration::from_secs(10))
//!         .build(Arc::new(Bookings), Arc::new(Publisher));
//!
//!     match gateway.admit(json!({ "code": "AAA111" })).await {
//!         Admission::Accepted { .. } | Admission::AcceptedAtCapacity { .. } => {}
//!         Admission::Rejected(cause) => eprintln!("rejected: {cause:?}"),
//!     }
//! }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod breaker;
mod config;
mod dispatcher;
mod envelope;
mod error;
mod fault;
mod hook;
mod limiter;
mod metrics;
mod policy;
pub mod prelude;
mod state;

// Re-exports
pub use breaker::CircuitBreaker;
pub use config::{BreakerBuilder, GatewayBuilder};
pub use dispatcher::{Admission, AdmissionDispatcher, Booking, BookingService, RejectionCause};
pub use envelope::Envelope;
pub use error::{BreakerError, BreakerResult, CapacityExceeded, CreationError, PublishError};
pub use fault::{FaultBroadcaster, FaultEvent, FaultPublisher};
pub use hook::HookRegistry;
pub use limiter::{CapacityRejection, ConsumeGrant, TokenBucketLimiter};
pub use metrics::{BreakerStats, MetricSink, NullMetricSink};
pub use policy::{ErrorRatePolicy, TripPolicy};
pub use state::State;
