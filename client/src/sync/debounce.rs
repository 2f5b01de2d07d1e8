//! Trailing-edge debounce timer.
//!
//! Local edits arrive keystroke-by-keystroke; the wire only needs the
//! settled result. `touch` records an edit and restarts the window; the
//! flush fires once the window elapses with no further touches.

use tokio::time::{Duration, Instant};

/// Trailing-edge debounce over the tokio clock, so tests can drive it with
/// a paused runtime.
#[derive(Debug)]
pub struct Debounce {
    window: Duration,
    deadline: Option<Instant>,
}

impl Debounce {
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self { window, deadline: None }
    }

    /// Record an edit. Restarts the window when one is already pending.
    pub fn touch(&mut self) {
        self.deadline = Some(Instant::now() + self.window);
    }

    /// Whether an edit is waiting to be flushed.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// The instant the pending flush becomes due, for `sleep_until` in a
    /// driver loop.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Consume the pending flush if its window has elapsed. Returns true at
    /// most once per `touch` burst.
    pub fn flush_due(&mut self) -> bool {
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    /// Drop the pending flush without firing it. Used when remote state
    /// supersedes the local edit.
    pub fn cancel(&mut self) {
        self.deadline = None;
    }
}

#[cfg(test)]
#[path = "debounce_test.rs"]
mod tests;
