//! Whiteboard reconciliation.
//!
//! DESIGN
//! ======
//! The document is replaced wholesale on every update; there is no
//! per-element merge. Three guards keep that model stable:
//!
//! - A remote-apply cooldown, as in the code editor, so applying a peer's
//!   document does not re-broadcast it.
//! - A drawing guard: inbound documents are dropped while a local gesture
//!   is in flight, otherwise the apply would wipe the half-drawn stroke.
//! - A clear shield: after an authoritative clear, in-flight documents
//!   from before the clear keep arriving for a moment. The shield drops
//!   inbound updates that do not carry a newer clear token, so a cleared
//!   board cannot resurrect.
//!
//! Clears bypass the debounce entirely and carry a monotonically
//! increasing token; a token at or below the last one seen is a replay.

use events::{ClientEvent, WhiteboardDocument};
use tokio::time::{Duration, Instant};

use crate::sync::{Cooldown, Debounce};

pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(300);
pub const REMOTE_APPLY_COOLDOWN: Duration = Duration::from_millis(100);
/// How long after an applied clear inbound non-clear documents are stale.
pub const CLEAR_SHIELD: Duration = Duration::from_millis(400);

#[derive(Debug)]
pub struct WhiteboardSync {
    document: WhiteboardDocument,
    /// Highest clear token seen, local or remote.
    clear_token: u64,
    drawing: bool,
    debounce: Debounce,
    cooldown: Cooldown,
    clear_shield: Cooldown,
}

impl Default for WhiteboardSync {
    fn default() -> Self {
        Self::new()
    }
}

impl WhiteboardSync {
    #[must_use]
    pub fn new() -> Self {
        Self {
            document: WhiteboardDocument::default(),
            clear_token: 0,
            drawing: false,
            debounce: Debounce::new(DEBOUNCE_WINDOW),
            cooldown: Cooldown::new(REMOTE_APPLY_COOLDOWN),
            clear_shield: Cooldown::new(CLEAR_SHIELD),
        }
    }

    #[must_use]
    pub fn document(&self) -> &WhiteboardDocument {
        &self.document
    }

    #[must_use]
    pub fn clear_token(&self) -> u64 {
        self.clear_token
    }

    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.debounce.deadline()
    }

    /// A pointer-down started a gesture; inbound documents are deferred
    /// until it ends.
    pub fn begin_stroke(&mut self) {
        self.drawing = true;
    }

    pub fn end_stroke(&mut self) {
        self.drawing = false;
    }

    /// Record a local document change (stroke finished, text box edited,
    /// shape moved). Changes during the remote-apply cooldown are the
    /// canvas reacting to applied state and are not scheduled.
    ///
    /// Emptying a non-empty board is a clear: it returns the clear event
    /// immediately instead of waiting for the debounce.
    pub fn local_change(&mut self, document: WhiteboardDocument) -> Option<ClientEvent> {
        if self.cooldown.active() {
            self.document = document;
            return None;
        }
        let was_empty = self.document.is_empty();
        self.document = document;
        if self.document.is_empty() && !was_empty {
            return Some(self.emit_clear());
        }
        self.debounce.touch();
        None
    }

    /// Clear the board. Bypasses the debounce: the clear goes on the wire
    /// immediately, stamped with a fresh token.
    pub fn clear(&mut self) -> ClientEvent {
        self.document = WhiteboardDocument::default();
        self.emit_clear()
    }

    fn emit_clear(&mut self) -> ClientEvent {
        self.clear_token += 1;
        self.debounce.cancel();
        // Shield ourselves from in-flight pre-clear documents too.
        self.clear_shield.arm();
        ClientEvent::WhiteboardUpdate {
            document: WhiteboardDocument::default(),
            clear_token: Some(self.clear_token),
        }
    }

    /// Take the settled local change once due. Deferred while a gesture is
    /// in flight so a half-drawn stroke never goes on the wire.
    pub fn flush(&mut self) -> Option<ClientEvent> {
        if self.drawing || !self.debounce.flush_due() {
            return None;
        }
        Some(ClientEvent::WhiteboardUpdate { document: self.document.clone(), clear_token: None })
    }

    /// Apply a remote update. Returns whether it was applied.
    ///
    /// A clear with a newer token always applies, even mid-gesture: it is
    /// authoritative and the stroke being drawn belongs to the cleared
    /// board. Replayed clears and shielded or mid-gesture documents are
    /// dropped.
    pub fn apply_remote(
        &mut self,
        document: WhiteboardDocument,
        clear_token: Option<u64>,
    ) -> bool {
        if let Some(token) = clear_token {
            if token <= self.clear_token {
                return false;
            }
            self.clear_token = token;
            self.document = document;
            self.drawing = false;
            self.debounce.cancel();
            self.cooldown.arm();
            self.clear_shield.arm();
            return true;
        }

        if self.drawing || self.clear_shield.active() {
            return false;
        }
        self.document = document;
        self.debounce.cancel();
        self.cooldown.arm();
        true
    }

    /// Hydrate from a join snapshot or a `whiteboard-state` reply.
    pub fn hydrate(&mut self, document: WhiteboardDocument, clear_token: Option<u64>) {
        self.document = document;
        if let Some(token) = clear_token {
            self.clear_token = self.clear_token.max(token);
        }
        self.debounce.cancel();
    }
}

#[cfg(test)]
#[path = "whiteboard_test.rs"]
mod tests;
