//! WebSocket handler — session manager and event dispatch.
//!
//! DESIGN
//! ======
//! On upgrade, mints a connection id and enters a `select!` loop:
//! - Incoming client events → decode + dispatch by event kind
//! - Broadcast events from room peers → forward to the client
//!
//! Handler functions are pure business logic — they validate, mutate the
//! registry, and return an `Outcome`. The dispatch layer owns all outbound
//! concerns: reply to sender and broadcast to the session's room.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → send `connected` with the connection id
//! 2. `Unbound → Bound(room, identity)` on create/join
//! 3. Leave, transport error, or stream end → participant removal, roster
//!    broadcast to the survivors, room teardown when the roster empties

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use events::{ClientEvent, ServerEvent, decode_client_event, encode_server_event};

use crate::registry::{Member, RoomError};
use crate::state::AppState;

// =============================================================================
// SESSION
// =============================================================================

/// Per-connection state machine. No other states exist: a connection is
/// either outside every room or bound to exactly one.
#[derive(Clone, Debug, PartialEq, Eq)]
enum Session {
    Unbound,
    Bound { room_key: String, identity: String },
}

// =============================================================================
// OUTCOME
// =============================================================================

/// Result returned by handler functions. The dispatch layer uses this to
/// decide who receives what — handlers never send events directly.
enum Outcome {
    /// Send one event to the sender only.
    Reply(ServerEvent),
    /// Broadcast to the session's room. `include_origin` selects whether
    /// the originator sees its own event (roster and execution output do,
    /// document updates do not).
    Broadcast { event: ServerEvent, include_origin: bool },
    /// Reply to the sender with one event, broadcast another to the room.
    ReplyAndBroadcast { reply: ServerEvent, broadcast: ServerEvent, include_origin: bool },
    /// Nothing to send. Used for dropped events and leave.
    Silent,
}

// =============================================================================
// UPGRADE + CONNECTION
// =============================================================================

pub async fn handle_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| run_ws(socket, state))
}

async fn run_ws(mut socket: WebSocket, state: AppState) {
    let connection_id = Uuid::new_v4();

    // Per-connection channel for events broadcast by room peers.
    let (client_tx, mut client_rx) = mpsc::channel::<ServerEvent>(256);

    let welcome = ServerEvent::Connected { connection_id: connection_id.to_string() };
    if send_event(&mut socket, &welcome).await.is_err() {
        return;
    }

    info!(%connection_id, "ws: client connected");

    let mut session = Session::Unbound;

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(msg) = msg else { break };
                let Ok(msg) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        let replies =
                            process_inbound_text(&state, &mut session, connection_id, &client_tx, &text).await;
                        for event in replies {
                            if send_event(&mut socket, &event).await.is_err() {
                                break;
                            }
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(event) = client_rx.recv() => {
                if send_event(&mut socket, &event).await.is_err() {
                    break;
                }
            }
        }
    }

    // Transport drop is handled identically to an explicit leave.
    if let Session::Bound { room_key, identity } = session {
        leave_room(&state, &room_key, &identity, connection_id).await;
    }
    info!(%connection_id, "ws: client disconnected");
}

// =============================================================================
// DISPATCH
// =============================================================================

/// Decode and process one inbound text message, returning events for the
/// sender. Split from the socket loop so tests can exercise dispatch and
/// broadcast behavior end-to-end over plain channels.
async fn process_inbound_text(
    state: &AppState,
    session: &mut Session,
    connection_id: Uuid,
    client_tx: &mpsc::Sender<ServerEvent>,
    text: &str,
) -> Vec<ServerEvent> {
    let event = match decode_client_event(text) {
        Ok(event) => event,
        Err(e) => {
            // Malformed payload: drop the event. No crash, no broadcast,
            // no reply — the action is simply lost for the sender.
            warn!(%connection_id, error = %e, "ws: malformed inbound event dropped");
            return Vec::new();
        }
    };

    let outcome = match event {
        ClientEvent::CreateRoom { identity } => {
            handle_create(state, session, connection_id, client_tx, identity).await
        }
        ClientEvent::JoinRoom { room_key, identity } => {
            handle_join(state, session, connection_id, client_tx, &room_key, identity).await
        }
        ClientEvent::CodeUpdate { text, language, .. } => {
            handle_code(state, session, connection_id, text, language, false).await
        }
        ClientEvent::LanguageUpdate { text, language, .. } => {
            handle_code(state, session, connection_id, text, language, true).await
        }
        ClientEvent::WhiteboardUpdate { document, clear_token } => {
            handle_whiteboard(state, session, connection_id, document, clear_token).await
        }
        ClientEvent::FlowchartUpdate { elements, render_source } => {
            handle_flowchart(state, session, connection_id, elements, render_source).await
        }
        ClientEvent::RequestWhiteboardState { room_key } => {
            match state.registry.whiteboard_state(&room_key).await {
                Some((document, clear_token)) => {
                    Outcome::Reply(ServerEvent::WhiteboardState { document, clear_token })
                }
                None => Outcome::Silent,
            }
        }
        ClientEvent::RequestFlowchartState { room_key } => {
            match state.registry.flowchart_state(&room_key).await {
                Some(doc) => Outcome::Reply(ServerEvent::FlowchartState {
                    elements: doc.elements,
                    render_source: doc.render_source,
                }),
                None => Outcome::Silent,
            }
        }
        ClientEvent::LeaveRoom => {
            if let Session::Bound { room_key, identity } = std::mem::replace(session, Session::Unbound) {
                leave_room(state, &room_key, &identity, connection_id).await;
            }
            Outcome::Silent
        }
        ClientEvent::ExecutionResultUpdate { result } => {
            if matches!(session, Session::Unbound) {
                warn!(%connection_id, "ws: execution result outside a room dropped");
                Outcome::Silent
            } else {
                Outcome::Broadcast {
                    event: ServerEvent::ExecutionResultUpdate { result },
                    include_origin: true,
                }
            }
        }
    };

    apply_outcome(state, session, connection_id, outcome).await
}

/// The dispatch layer owns all outbound logic: replies go back through the
/// socket, broadcasts fan out through the registry.
async fn apply_outcome(
    state: &AppState,
    session: &Session,
    connection_id: Uuid,
    outcome: Outcome,
) -> Vec<ServerEvent> {
    let room_key = match session {
        Session::Bound { room_key, .. } => Some(room_key.clone()),
        Session::Unbound => None,
    };

    match outcome {
        Outcome::Reply(event) => vec![event],
        Outcome::Broadcast { event, include_origin } => {
            if let Some(key) = room_key {
                let exclude = if include_origin { None } else { Some(connection_id) };
                state.registry.broadcast(&key, &event, exclude).await;
            }
            Vec::new()
        }
        Outcome::ReplyAndBroadcast { reply, broadcast, include_origin } => {
            if let Some(key) = room_key {
                let exclude = if include_origin { None } else { Some(connection_id) };
                state.registry.broadcast(&key, &broadcast, exclude).await;
            }
            vec![reply]
        }
        Outcome::Silent => Vec::new(),
    }
}

// =============================================================================
// ROOM HANDLERS
// =============================================================================

async fn handle_create(
    state: &AppState,
    session: &mut Session,
    connection_id: Uuid,
    client_tx: &mpsc::Sender<ServerEvent>,
    identity: String,
) -> Outcome {
    // A bound connection that creates a new room implicitly leaves its old one.
    if let Session::Bound { room_key, identity } = std::mem::replace(session, Session::Unbound) {
        leave_room(state, &room_key, &identity, connection_id).await;
    }

    // Server-minted key; regenerate on the (unlikely) collision.
    let participants = loop {
        let key = generate_room_key();
        let member = Member { connection_id, identity: identity.clone(), tx: client_tx.clone() };
        match state.registry.create_room(&key, member).await {
            Ok(participants) => {
                *session = Session::Bound { room_key: key, identity: identity.clone() };
                break participants;
            }
            Err(RoomError::AlreadyExists(_)) => continue,
            Err(e) => return Outcome::Reply(ServerEvent::RoomError { reason: e.reason() }),
        }
    };

    let Session::Bound { room_key, .. } = &*session else {
        return Outcome::Silent;
    };
    Outcome::ReplyAndBroadcast {
        reply: ServerEvent::RoomCreated {
            room_key: room_key.clone(),
            participants: participants.clone(),
        },
        broadcast: ServerEvent::ParticipantsChanged { participants },
        include_origin: true,
    }
}

async fn handle_join(
    state: &AppState,
    session: &mut Session,
    connection_id: Uuid,
    client_tx: &mpsc::Sender<ServerEvent>,
    room_key: &str,
    identity: String,
) -> Outcome {
    if let Session::Bound { room_key: old_key, identity: old_identity } =
        std::mem::replace(session, Session::Unbound)
    {
        // Rejoining the same room under the same identity is the reconnect
        // path; reconciliation handles it without an explicit leave.
        if old_key != room_key || old_identity != identity {
            leave_room(state, &old_key, &old_identity, connection_id).await;
        }
    }

    let member = Member { connection_id, identity: identity.clone(), tx: client_tx.clone() };
    match state.registry.join_room(room_key, member).await {
        Ok(snapshot) => {
            *session = Session::Bound { room_key: room_key.to_owned(), identity };
            let participants = snapshot.participants.clone();
            Outcome::ReplyAndBroadcast {
                reply: ServerEvent::RoomJoined {
                    room_key: snapshot.room_key,
                    participants: snapshot.participants,
                    code: snapshot.code,
                    whiteboard: snapshot.whiteboard,
                    whiteboard_clear_token: snapshot.whiteboard_clear,
                    flowchart: snapshot.flowchart,
                },
                broadcast: ServerEvent::ParticipantsChanged { participants },
                include_origin: true,
            }
        }
        Err(e) => {
            info!(%connection_id, room_key, "ws: join refused: {e}");
            Outcome::Reply(ServerEvent::RoomError { reason: e.reason() })
        }
    }
}

// =============================================================================
// DOCUMENT HANDLERS
// =============================================================================

async fn handle_code(
    state: &AppState,
    session: &Session,
    connection_id: Uuid,
    text: String,
    language: String,
    language_change: bool,
) -> Outcome {
    let Session::Bound { room_key, .. } = session else {
        warn!(%connection_id, "ws: code update outside a room dropped");
        return Outcome::Silent;
    };

    if let Err(e) = state.registry.update_code(room_key, &text, &language).await {
        warn!(%connection_id, room_key, error = %e, "ws: code update lost");
        return Outcome::Silent;
    }

    // The server stamps the origin; the client-claimed value is ignored.
    let origin = connection_id.to_string();
    let event = if language_change {
        ServerEvent::LanguageUpdate { text, language, origin }
    } else {
        ServerEvent::CodeUpdate { text, language, origin }
    };
    Outcome::Broadcast { event, include_origin: false }
}

async fn handle_whiteboard(
    state: &AppState,
    session: &Session,
    connection_id: Uuid,
    document: events::WhiteboardDocument,
    clear_token: Option<u64>,
) -> Outcome {
    let Session::Bound { room_key, .. } = session else {
        warn!(%connection_id, "ws: whiteboard update outside a room dropped");
        return Outcome::Silent;
    };

    if let Err(e) = state
        .registry
        .update_whiteboard(room_key, document.clone(), clear_token)
        .await
    {
        warn!(%connection_id, room_key, error = %e, "ws: whiteboard update lost");
        return Outcome::Silent;
    }

    Outcome::Broadcast {
        event: ServerEvent::WhiteboardUpdate { document, clear_token },
        include_origin: false,
    }
}

async fn handle_flowchart(
    state: &AppState,
    session: &Session,
    connection_id: Uuid,
    elements: Vec<events::FlowchartElement>,
    render_source: String,
) -> Outcome {
    let Session::Bound { room_key, .. } = session else {
        warn!(%connection_id, "ws: flowchart update outside a room dropped");
        return Outcome::Silent;
    };

    if let Err(e) = state
        .registry
        .update_flowchart(room_key, elements.clone(), render_source.clone())
        .await
    {
        warn!(%connection_id, room_key, error = %e, "ws: flowchart update lost");
        return Outcome::Silent;
    }

    Outcome::Broadcast {
        event: ServerEvent::FlowchartUpdate { elements, render_source },
        include_origin: false,
    }
}

// =============================================================================
// HELPERS
// =============================================================================

/// Remove a participant and tell the survivors. Safe against rooms already
/// gone and slots already reclaimed by a faster reconnect.
async fn leave_room(state: &AppState, room_key: &str, identity: &str, connection_id: Uuid) {
    if let Some(participants) = state
        .registry
        .remove_participant(room_key, identity, connection_id)
        .await
    {
        state
            .registry
            .broadcast(room_key, &ServerEvent::ParticipantsChanged { participants }, None)
            .await;
    }
}

/// Generate an 8-hex-char room key.
fn generate_room_key() -> String {
    use rand::Rng;
    use std::fmt::Write;
    let bytes: [u8; 4] = rand::rng().random();
    let mut key = String::with_capacity(8);
    for b in bytes {
        let _ = write!(key, "{b:02x}");
    }
    key
}

async fn send_event(socket: &mut WebSocket, event: &ServerEvent) -> Result<(), ()> {
    let json = encode_server_event(event);
    socket.send(Message::Text(json.into())).await.map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
