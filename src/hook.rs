//! Transition-event observers.
//!
//! Transition detection (in the breaker) and side-effect dispatch (here) are
//! separate steps, so tests can assert on transitions without any outbound
//! side effects and the fault broadcaster is just one more observer.

use crate::state::State;
use parking_lot::RwLock;
use std::sync::Arc;

type HookFn = Arc<dyn Fn() + Send + Sync + 'static>;

/// Observer lists for breaker state transitions.
///
/// Each transition into open, half-open, or closed notifies every observer
/// registered for that transition, in registration order. Observers run
/// synchronously at the transition point, outside the breaker's lock path.
#[derive(Default)]
pub struct HookRegistry {
    on_open: RwLock<Vec<HookFn>>,
    on_half_open: RwLock<Vec<HookFn>>,
    on_close: RwLock<Vec<HookFn>>,
}

impl HookRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an observer for transitions into open.
    pub fn on_open<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_open.write().push(Arc::new(f));
    }

    /// Registers an observer for transitions into half-open.
    pub fn on_half_open<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_half_open.write().push(Arc::new(f));
    }

    /// Registers an observer for transitions into closed.
    pub fn on_close<F>(&self, f: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_close.write().push(Arc::new(f));
    }

    /// Notifies every observer registered for a transition into `to`.
    pub fn notify(&self, to: State) {
        let observers = match to {
            State::Open => self.on_open.read(),
            State::HalfOpen => self.on_half_open.read(),
            State::Closed => self.on_close.read(),
        };

        for hook in observers.iter() {
            hook();
        }
    }
}
