//! Fixed-length suppression window.
//!
//! Applying remote state fires the same local change callbacks a user edit
//! would; the cooldown marks the window in which those callbacks must not
//! be re-broadcast. The whiteboard reuses it as the post-clear shield.

use tokio::time::{Duration, Instant};

#[derive(Debug)]
pub struct Cooldown {
    window: Duration,
    until: Option<Instant>,
}

impl Cooldown {
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self { window, until: None }
    }

    /// Start (or restart) the window from now.
    pub fn arm(&mut self) {
        self.until = Some(Instant::now() + self.window);
    }

    /// Whether the window is still open.
    #[must_use]
    pub fn active(&self) -> bool {
        self.until.is_some_and(|until| Instant::now() < until)
    }
}

#[cfg(test)]
#[path = "cooldown_test.rs"]
mod tests;
