//! Headless client reconciliation layer for collabcode rooms.
//!
//! ARCHITECTURE
//! ============
//! - `net` owns the WebSocket lifecycle: connect, reconnect with backoff,
//!   and the channel pair the rest of the client talks through.
//! - `room` tracks what the server has told us: roster, documents, and our
//!   own connection id.
//! - `sync` holds the per-surface reconciliation machines (code,
//!   whiteboard, flowchart) and the shared debounce/cooldown timers.
//!
//! The sync machines are transport-free: they consume local edits and
//! remote events, and yield the client events that should go on the wire.
//! The caller drives time through them, which keeps every timing rule
//! testable under a paused clock.

pub mod net;
pub mod room;
pub mod sync;
