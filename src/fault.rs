//! Broadcasts breaker health to other processes.
//!
//! Subscribers on the fault topic see `"true"` when the circuit opens and
//! `"false"` once it starts probing recovery or closes. One publish per
//! transition, best-effort: a failed publish is logged and never retried.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::breaker::CircuitBreaker;
use crate::error::PublishError;
use crate::hook::HookRegistry;
use crate::policy::TripPolicy;

/// One fault-status message. Transient; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultEvent {
    /// Topic the event is published on.
    pub topic: String,
    /// Whether the guarded path is currently faulty (breaker open).
    pub faulty: bool,
}

impl FaultEvent {
    /// Wire payload: the literal string `"true"` or `"false"`.
    pub fn payload(&self) -> &'static str {
        if self.faulty {
            "true"
        } else {
            "false"
        }
    }
}

/// Outbound publish channel. The broker client lives outside this crate;
/// implementations wrap whatever transport the process uses.
pub trait FaultPublisher: Send + Sync + 'static {
    /// Publishes one event. Best-effort; errors are logged by the caller
    /// and not retried.
    fn publish(&self, event: &FaultEvent) -> Result<(), PublishError>;
}

/// Mirrors breaker transitions onto the fault topic.
///
/// Cheap to clone; each registered observer holds its own handle.
#[derive(Clone)]
pub struct FaultBroadcaster {
    topic: String,
    publisher: Arc<dyn FaultPublisher>,
}

impl FaultBroadcaster {
    /// Creates a broadcaster publishing on `topic`.
    pub fn new(topic: impl Into<String>, publisher: Arc<dyn FaultPublisher>) -> Self {
        Self {
            topic: topic.into(),
            publisher,
        }
    }

    /// Topic this broadcaster publishes on.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Subscribes to a breaker's transition events.
    ///
    /// Registers one observer per transition: open publishes `"true"`,
    /// half-open and closed publish `"false"`. Transition order is
    /// preserved because observers run at the transition point.
    pub fn attach<P, E>(&self, breaker: &CircuitBreaker<P, E>)
    where
        P: TripPolicy,
        E: std::error::Error + 'static,
    {
        self.subscribe(breaker.hooks());
    }

    /// Hook-registry form of [`attach`](Self::attach), for wiring before a
    /// breaker is built.
    pub fn subscribe(&self, hooks: &HookRegistry) {
        let broadcaster = self.clone();
        hooks.on_open(move || broadcaster.announce(true));

        let broadcaster = self.clone();
        hooks.on_half_open(move || broadcaster.announce(false));

        let broadcaster = self.clone();
        hooks.on_close(move || broadcaster.announce(false));
    }

    fn announce(&self, faulty: bool) {
        let event = FaultEvent {
            topic: self.topic.clone(),
            faulty,
        };

        match self.publisher.publish(&event) {
            Ok(()) => {
                debug!(topic = %event.topic, payload = event.payload(), "fault status published")
            }
            Err(e) => warn!(error = %e, "fault status publish failed"),
        }
    }
}
