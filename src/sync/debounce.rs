//! Debouncing of transient pause gestures.
//!
//! Scrub drags and bouncy play/pause toggles produce pause events that do not
//! represent a state the master wants to announce. A pause only becomes
//! "stable" once it survives a short window without a play or seek arriving.

use std::time::{Duration, Instant};

use log::trace;

/// Single-shot, cancelable debounce window for pause gestures.
///
/// The debouncer itself is pure: callers pass in the current time and
/// schedule the actual timer from `deadline()`.
pub struct PauseSeekDebouncer {
    threshold: Duration,
    deadline: Option<Instant>,
}

impl PauseSeekDebouncer {
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold,
            deadline: None,
        }
    }

    /// A pause event arrived: arm (or re-arm) the window and return the
    /// instant at which the pause becomes stable
    pub fn on_pause(&mut self, now: Instant) -> Instant {
        let deadline = now + self.threshold;
        self.deadline = Some(deadline);
        trace!("pause debounce window armed for {:?}", self.threshold);
        deadline
    }

    /// Cancel any pending window (play or seek arrived in time).
    /// Returns whether there was one.
    pub fn cancel_pending(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    /// When armed, the instant the pending pause becomes stable
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Resolve the window: true exactly once, when a pending pause has
    /// survived to its deadline
    pub fn fire_if_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}
