//! Room registry — the authoritative store of live room state.
//!
//! DESIGN
//! ======
//! Rooms live behind a two-level lock: an outer `RwLock` map resolving room
//! keys, and a per-room `Mutex` guarding the documents and roster. Document
//! updates take the outer lock in read mode, so operations on different
//! rooms never block each other; only room creation and teardown take the
//! map in write mode.
//!
//! LIFECYCLE
//! =========
//! A room exists from the `create_room` that minted it until the removal of
//! its last participant. Teardown happens inside the same critical section
//! as the removal — no caller can observe a zero-participant room.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock, mpsc};
use tracing::info;
use uuid::Uuid;

use events::{
    CodeDocument, FlowchartDocument, FlowchartElement, Participant, RoomErrorReason, ServerEvent,
    WhiteboardDocument,
};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    #[error("room not found: {0}")]
    NotFound(String),
    #[error("room already exists: {0}")]
    AlreadyExists(String),
}

impl RoomError {
    /// Wire-level reason for the requesting client.
    #[must_use]
    pub fn reason(&self) -> RoomErrorReason {
        match self {
            Self::NotFound(_) => RoomErrorReason::NotFound,
            Self::AlreadyExists(_) => RoomErrorReason::AlreadyExists,
        }
    }
}

/// One live connection's membership in a room. The sender is the fan-out
/// channel the broadcast path writes to.
pub struct Member {
    pub connection_id: Uuid,
    pub identity: String,
    pub tx: mpsc::Sender<ServerEvent>,
}

/// Room state guarded by the per-room mutex.
struct Room {
    /// Insertion order = join order. At most one entry per identity.
    participants: Vec<Member>,
    code: CodeDocument,
    whiteboard: WhiteboardDocument,
    /// Token of the most recent authoritative whiteboard clear, if any.
    whiteboard_clear: Option<u64>,
    flowchart: FlowchartDocument,
}

impl Room {
    fn new() -> Self {
        Self {
            participants: Vec::new(),
            code: CodeDocument::default(),
            whiteboard: WhiteboardDocument::default(),
            whiteboard_clear: None,
            flowchart: FlowchartDocument::default(),
        }
    }

    fn roster(&self) -> Vec<Participant> {
        self.participants
            .iter()
            .map(|m| Participant {
                connection_id: m.connection_id.to_string(),
                identity: m.identity.clone(),
            })
            .collect()
    }
}

/// Full room state handed to a (re)joining client so it can hydrate
/// without waiting for the next broadcast.
#[derive(Clone, Debug)]
pub struct RoomSnapshot {
    pub room_key: String,
    pub participants: Vec<Participant>,
    pub code: CodeDocument,
    pub whiteboard: WhiteboardDocument,
    pub whiteboard_clear: Option<u64>,
    pub flowchart: FlowchartDocument,
}

// =============================================================================
// REGISTRY
// =============================================================================

/// Authoritative store of live rooms, keyed by room key.
#[derive(Default)]
pub struct RoomRegistry {
    rooms: RwLock<HashMap<String, Arc<Mutex<Room>>>>,
}

impl RoomRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a room with its first participant.
    ///
    /// # Errors
    ///
    /// Returns [`RoomError::AlreadyExists`] if the key is live; the existing
    /// room is never merged or overwritten.
    pub async fn create_room(&self, key: &str, member: Member) -> Result<Vec<Participant>, RoomError> {
        let mut rooms = self.rooms.write().await;
        if rooms.contains_key(key) {
            return Err(RoomError::AlreadyExists(key.to_owned()));
        }

        let mut room = Room::new();
        info!(room_key = key, identity = %member.identity, "room created");
        room.participants.push(member);
        let roster = room.roster();
        rooms.insert(key.to_owned(), Arc::new(Mutex::new(room)));
        Ok(roster)
    }

    /// Join an existing room, returning a full snapshot.
    ///
    /// If a participant with the same identity is already present this is a
    /// reconnect: the stale entry's connection id and sender are overwritten
    /// in place, preserving its position in the join order.
    ///
    /// # Errors
    ///
    /// Returns [`RoomError::NotFound`] if the key is absent.
    pub async fn join_room(&self, key: &str, member: Member) -> Result<RoomSnapshot, RoomError> {
        let rooms = self.rooms.read().await;
        let Some(room) = rooms.get(key) else {
            return Err(RoomError::NotFound(key.to_owned()));
        };
        let mut room = room.lock().await;

        if let Some(existing) = room
            .participants
            .iter_mut()
            .find(|m| m.identity == member.identity)
        {
            info!(room_key = key, identity = %member.identity, "participant reconnected");
            existing.connection_id = member.connection_id;
            existing.tx = member.tx;
        } else {
            info!(room_key = key, identity = %member.identity, "participant joined");
            room.participants.push(member);
        }

        Ok(RoomSnapshot {
            room_key: key.to_owned(),
            participants: room.roster(),
            code: room.code.clone(),
            whiteboard: room.whiteboard.clone(),
            whiteboard_clear: room.whiteboard_clear,
            flowchart: room.flowchart.clone(),
        })
    }

    /// Replace the code document wholesale. Last write wins.
    ///
    /// # Errors
    ///
    /// Returns [`RoomError::NotFound`] if the key is absent.
    pub async fn update_code(&self, key: &str, text: &str, language: &str) -> Result<(), RoomError> {
        let room = self.room(key).await?;
        let mut room = room.lock().await;
        room.code = CodeDocument { text: text.to_owned(), language: language.to_owned() };
        Ok(())
    }

    /// Replace the whiteboard document wholesale, recording the clear token
    /// when the update carries one.
    ///
    /// # Errors
    ///
    /// Returns [`RoomError::NotFound`] if the key is absent.
    pub async fn update_whiteboard(
        &self,
        key: &str,
        document: WhiteboardDocument,
        clear_token: Option<u64>,
    ) -> Result<(), RoomError> {
        let room = self.room(key).await?;
        let mut room = room.lock().await;
        room.whiteboard = document;
        if clear_token.is_some() {
            room.whiteboard_clear = clear_token;
        }
        Ok(())
    }

    /// Replace the flowchart document wholesale.
    ///
    /// # Errors
    ///
    /// Returns [`RoomError::NotFound`] if the key is absent.
    pub async fn update_flowchart(
        &self,
        key: &str,
        elements: Vec<FlowchartElement>,
        render_source: String,
    ) -> Result<(), RoomError> {
        let room = self.room(key).await?;
        let mut room = room.lock().await;
        room.flowchart = FlowchartDocument { elements, render_source };
        Ok(())
    }

    /// Remove the participant matching both `identity` and `connection_id`.
    ///
    /// The connection-id check guards against a disconnect racing a faster
    /// reconnect under the same identity: once the slot has been reclaimed
    /// its connection id no longer matches, and the stale disconnect is a
    /// no-op. Removal against an absent room is also a no-op — teardown is
    /// idempotent.
    ///
    /// Returns the remaining roster when a participant was removed and the
    /// room survives; `None` when nothing was removed or the room was torn
    /// down with its last participant.
    pub async fn remove_participant(
        &self,
        key: &str,
        identity: &str,
        connection_id: Uuid,
    ) -> Option<Vec<Participant>> {
        let mut rooms = self.rooms.write().await;
        let room_arc = rooms.get(key)?.clone();
        let mut room = room_arc.lock().await;

        let before = room.participants.len();
        room.participants
            .retain(|m| !(m.identity == identity && m.connection_id == connection_id));
        if room.participants.len() == before {
            return None;
        }
        info!(room_key = key, identity, remaining = room.participants.len(), "participant removed");

        if room.participants.is_empty() {
            drop(room);
            rooms.remove(key);
            info!(room_key = key, "room destroyed");
            return None;
        }
        Some(room.roster())
    }

    /// Fan out an event to every member of a room, optionally excluding one
    /// connection (the originator, for echo suppression).
    ///
    /// Delivery is best-effort and at-most-once: a member whose channel is
    /// full or closed simply misses this increment and recovers via the
    /// snapshot-on-join / state-request path.
    pub async fn broadcast(&self, key: &str, event: &ServerEvent, exclude: Option<Uuid>) {
        let rooms = self.rooms.read().await;
        let Some(room) = rooms.get(key) else {
            return;
        };
        let room = room.lock().await;
        for member in &room.participants {
            if exclude == Some(member.connection_id) {
                continue;
            }
            let _ = member.tx.try_send(event.clone());
        }
    }

    /// Current whiteboard document and clear token, for state requests.
    pub async fn whiteboard_state(&self, key: &str) -> Option<(WhiteboardDocument, Option<u64>)> {
        let rooms = self.rooms.read().await;
        let room = rooms.get(key)?.clone();
        drop(rooms);
        let room = room.lock().await;
        Some((room.whiteboard.clone(), room.whiteboard_clear))
    }

    /// Current flowchart document, for state requests.
    pub async fn flowchart_state(&self, key: &str) -> Option<FlowchartDocument> {
        let rooms = self.rooms.read().await;
        let room = rooms.get(key)?.clone();
        drop(rooms);
        let room = room.lock().await;
        Some(room.flowchart.clone())
    }

    /// Whether a room key is live.
    pub async fn contains(&self, key: &str) -> bool {
        self.rooms.read().await.contains_key(key)
    }

    /// Current roster of a room, if it exists.
    pub async fn roster(&self, key: &str) -> Option<Vec<Participant>> {
        let rooms = self.rooms.read().await;
        let room = rooms.get(key)?.clone();
        drop(rooms);
        let room = room.lock().await;
        Some(room.roster())
    }

    async fn room(&self, key: &str) -> Result<Arc<Mutex<Room>>, RoomError> {
        let rooms = self.rooms.read().await;
        rooms
            .get(key)
            .cloned()
            .ok_or_else(|| RoomError::NotFound(key.to_owned()))
    }
}

#[cfg(test)]
#[path = "registry_test.rs"]
mod tests;
