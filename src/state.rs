//! Circuit breaker state machine.

use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{Duration, Instant};

/// The three states of the admission breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Calls pass through to the guarded operation.
    Closed = 0,

    /// Calls are short-circuited without reaching the guarded operation.
    Open = 1,

    /// A single trial call is permitted to probe recovery.
    HalfOpen = 2,
}

impl From<u8> for State {
    fn from(value: u8) -> Self {
        match value {
            1 => State::Open,
            2 => State::HalfOpen,
            _ => State::Closed,
        }
    }
}

impl State {
    /// Stable lowercase label, used by logging and metric sinks.
    pub fn as_str(&self) -> &'static str {
        match self {
            State::Closed => "closed",
            State::Open => "open",
            State::HalfOpen => "half-open",
        }
    }
}

/// Tracks the current state and the instant it was entered.
///
/// Transitions are compare-and-swap so that exactly one caller wins a given
/// transition; the loser sees `false` and must not re-fire side effects.
pub struct StateManager {
    state: AtomicU8,
    entered_at: parking_lot::Mutex<Instant>,
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

impl StateManager {
    /// Creates a manager in the closed state.
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(State::Closed as u8),
            entered_at: parking_lot::Mutex::new(Instant::now()),
        }
    }

    /// Current state.
    pub fn current(&self) -> State {
        State::from(self.state.load(Ordering::Acquire))
    }

    /// How long the breaker has been in its current state.
    ///
    /// While open this is the time since `openedAt`, which drives the
    /// reset-timeout check.
    pub fn time_in_state(&self) -> Duration {
        self.entered_at.lock().elapsed()
    }

    /// Attempts the `from` → `to` transition, stamping the entry time on
    /// success. Returns whether this caller won the transition.
    pub fn transition(&self, from: State, to: State) -> bool {
        let won = self
            .state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();

        if won {
            *self.entered_at.lock() = Instant::now();
        }

        won
    }

    /// Trips to open from whatever non-open state we are in.
    pub fn trip_open(&self) -> bool {
        let current = self.current();
        if current == State::Open {
            return false;
        }

        self.transition(current, State::Open)
    }

    /// Open → half-open, once the reset timeout has elapsed.
    pub fn attempt_half_open(&self) -> bool {
        self.transition(State::Open, State::HalfOpen)
    }

    /// Half-open → closed after a successful trial.
    pub fn reset_closed(&self) -> bool {
        self.transition(State::HalfOpen, State::Closed)
    }

    /// Half-open → open after a failed trial. Re-stamps the open instant so
    /// the full reset timeout runs again.
    pub fn revert_to_open(&self) -> bool {
        self.transition(State::HalfOpen, State::Open)
    }
}
