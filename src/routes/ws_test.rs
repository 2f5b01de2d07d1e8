use super::*;

use events::{
    ClientEvent, ExecutionResult, Stroke, StrokePoint, WhiteboardDocument, encode_client_event,
};
use tokio::sync::mpsc;

use crate::state::AppState;
use crate::state::test_helpers::test_app_state;

/// One simulated connection: its minted id, session state, and the fan-out
/// channel the broadcast path writes to.
struct Conn {
    id: Uuid,
    session: Session,
    tx: mpsc::Sender<ServerEvent>,
    rx: mpsc::Receiver<ServerEvent>,
}

impl Conn {
    fn new() -> Self {
        let (tx, rx) = mpsc::channel(256);
        Self { id: Uuid::new_v4(), session: Session::Unbound, tx, rx }
    }

    async fn send(&mut self, state: &AppState, event: &ClientEvent) -> Vec<ServerEvent> {
        let text = encode_client_event(event);
        process_inbound_text(state, &mut self.session, self.id, &self.tx, &text).await
    }

    async fn send_raw(&mut self, state: &AppState, text: &str) -> Vec<ServerEvent> {
        process_inbound_text(state, &mut self.session, self.id, &self.tx, text).await
    }

    /// Everything broadcast to this connection so far. Broadcasts use
    /// `try_send`, so they are visible as soon as the dispatch call returns.
    fn drain(&mut self) -> Vec<ServerEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            out.push(event);
        }
        out
    }
}

async fn create(state: &AppState, conn: &mut Conn, identity: &str) -> String {
    let replies = conn
        .send(state, &ClientEvent::CreateRoom { identity: identity.to_owned() })
        .await;
    match replies.first() {
        Some(ServerEvent::RoomCreated { room_key, .. }) => room_key.clone(),
        other => panic!("expected room-created, got {other:?}"),
    }
}

async fn join(state: &AppState, conn: &mut Conn, room_key: &str, identity: &str) -> Vec<ServerEvent> {
    conn.send(
        state,
        &ClientEvent::JoinRoom { room_key: room_key.to_owned(), identity: identity.to_owned() },
    )
    .await
}

fn one_stroke_board() -> WhiteboardDocument {
    WhiteboardDocument {
        lines: vec![Stroke {
            id: "s1".to_owned(),
            points: vec![StrokePoint { x: 1.0, y: 2.0 }, StrokePoint { x: 3.0, y: 4.0 }],
            color: "#000000".to_owned(),
            size: 2.0,
            tool: "pen".to_owned(),
        }],
        text_boxes: Vec::new(),
        shapes: Vec::new(),
    }
}

// =============================================================================
// ROOM LIFECYCLE
// =============================================================================

#[tokio::test]
async fn create_room_mints_key_and_binds_session() {
    let state = test_app_state();
    let mut alice = Conn::new();

    let key = create(&state, &mut alice, "alice").await;
    assert_eq!(key.len(), 8);
    assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    assert!(state.registry.contains(&key).await);

    match &alice.session {
        Session::Bound { room_key, identity } => {
            assert_eq!(room_key, &key);
            assert_eq!(identity, "alice");
        }
        Session::Unbound => panic!("creator must be bound to the new room"),
    }

    // The creator also receives the roster broadcast for its own join.
    let events = alice.drain();
    assert!(matches!(
        events.as_slice(),
        [ServerEvent::ParticipantsChanged { participants }] if participants.len() == 1
    ));
}

#[tokio::test]
async fn join_delivers_full_snapshot_and_notifies_room() {
    let state = test_app_state();
    let mut alice = Conn::new();
    let key = create(&state, &mut alice, "alice").await;

    alice
        .send(
            &state,
            &ClientEvent::CodeUpdate {
                text: "print('hi')".to_owned(),
                language: "python".to_owned(),
                origin: String::new(),
            },
        )
        .await;
    alice.drain();

    let mut bob = Conn::new();
    let replies = join(&state, &mut bob, &key, "bob").await;
    match replies.first() {
        Some(ServerEvent::RoomJoined { room_key, participants, code, .. }) => {
            assert_eq!(room_key, &key);
            assert_eq!(participants.len(), 2);
            assert_eq!(code.text, "print('hi')");
            assert_eq!(code.language, "python");
        }
        other => panic!("expected room-joined snapshot, got {other:?}"),
    }

    // Existing members learn about the new roster; the joiner also gets the
    // broadcast since roster changes include the origin.
    let alice_events = alice.drain();
    assert!(matches!(
        alice_events.as_slice(),
        [ServerEvent::ParticipantsChanged { participants }] if participants.len() == 2
    ));
    assert_eq!(bob.drain().len(), 1);
}

#[tokio::test]
async fn join_unknown_room_reports_not_found() {
    let state = test_app_state();
    let mut bob = Conn::new();

    let replies = join(&state, &mut bob, "deadbeef", "bob").await;
    assert!(matches!(
        replies.as_slice(),
        [ServerEvent::RoomError { reason: events::RoomErrorReason::NotFound }]
    ));
    assert_eq!(bob.session, Session::Unbound);
}

#[tokio::test]
async fn last_leave_tears_down_the_room() {
    let state = test_app_state();
    let mut alice = Conn::new();
    let key = create(&state, &mut alice, "alice").await;

    let replies = alice.send(&state, &ClientEvent::LeaveRoom).await;
    assert!(replies.is_empty());
    assert_eq!(alice.session, Session::Unbound);
    assert!(!state.registry.contains(&key).await);
}

#[tokio::test]
async fn leave_notifies_survivors() {
    let state = test_app_state();
    let mut alice = Conn::new();
    let key = create(&state, &mut alice, "alice").await;
    let mut bob = Conn::new();
    join(&state, &mut bob, &key, "bob").await;
    alice.drain();

    bob.send(&state, &ClientEvent::LeaveRoom).await;

    let events = alice.drain();
    assert!(matches!(
        events.as_slice(),
        [ServerEvent::ParticipantsChanged { participants }]
            if participants.len() == 1 && participants[0].identity == "alice"
    ));
    assert!(state.registry.contains(&key).await);
}

#[tokio::test]
async fn reconnect_reclaims_slot_in_place() {
    let state = test_app_state();
    let mut alice = Conn::new();
    let key = create(&state, &mut alice, "alice").await;
    let mut bob = Conn::new();
    join(&state, &mut bob, &key, "bob").await;

    // Bob reconnects on a fresh connection under the same identity.
    let mut bob2 = Conn::new();
    let replies = join(&state, &mut bob2, &key, "bob").await;
    match replies.first() {
        Some(ServerEvent::RoomJoined { participants, .. }) => {
            assert_eq!(participants.len(), 2, "reconnect must not duplicate the identity");
            assert_eq!(participants[0].identity, "alice");
            assert_eq!(participants[1].identity, "bob");
            assert_eq!(participants[1].connection_id, bob2.id.to_string());
        }
        other => panic!("expected room-joined snapshot, got {other:?}"),
    }

    // The stale connection's disconnect must not evict the reclaimed slot.
    leave_room(&state, &key, "bob", bob.id).await;
    let roster = state.registry.roster(&key).await.unwrap();
    assert_eq!(roster.len(), 2);
}

// =============================================================================
// DOCUMENT PROPAGATION
// =============================================================================

#[tokio::test]
async fn code_update_excludes_the_originator() {
    let state = test_app_state();
    let mut alice = Conn::new();
    let key = create(&state, &mut alice, "alice").await;
    let mut bob = Conn::new();
    join(&state, &mut bob, &key, "bob").await;
    alice.drain();
    bob.drain();

    let replies = alice
        .send(
            &state,
            &ClientEvent::CodeUpdate {
                text: "x = 1".to_owned(),
                language: "python".to_owned(),
                origin: "spoofed".to_owned(),
            },
        )
        .await;
    assert!(replies.is_empty());
    assert!(alice.drain().is_empty(), "originator must not receive its own edit");

    let events = bob.drain();
    match events.as_slice() {
        [ServerEvent::CodeUpdate { text, origin, .. }] => {
            assert_eq!(text, "x = 1");
            // The server stamps the origin from the connection, ignoring the
            // client-supplied value.
            assert_eq!(origin, &alice.id.to_string());
        }
        other => panic!("expected one code-update, got {other:?}"),
    }
}

#[tokio::test]
async fn language_change_replaces_text_for_peers() {
    let state = test_app_state();
    let mut alice = Conn::new();
    let key = create(&state, &mut alice, "alice").await;
    let mut bob = Conn::new();
    join(&state, &mut bob, &key, "bob").await;
    alice.drain();
    bob.drain();

    bob.send(
        &state,
        &ClientEvent::LanguageUpdate {
            text: "console.log(1);".to_owned(),
            language: "javascript".to_owned(),
            origin: String::new(),
        },
    )
    .await;

    let events = alice.drain();
    assert!(matches!(
        events.as_slice(),
        [ServerEvent::LanguageUpdate { language, .. }] if language == "javascript"
    ));
    assert!(bob.drain().is_empty());

    // A later joiner sees the post-switch document.
    let mut carol = Conn::new();
    let replies = join(&state, &mut carol, &key, "carol").await;
    match replies.first() {
        Some(ServerEvent::RoomJoined { code, .. }) => {
            assert_eq!(code.language, "javascript");
            assert_eq!(code.text, "console.log(1);");
        }
        other => panic!("expected room-joined snapshot, got {other:?}"),
    }
}

#[tokio::test]
async fn whiteboard_update_carries_clear_token() {
    let state = test_app_state();
    let mut alice = Conn::new();
    let key = create(&state, &mut alice, "alice").await;
    let mut bob = Conn::new();
    join(&state, &mut bob, &key, "bob").await;
    alice.drain();
    bob.drain();

    alice
        .send(
            &state,
            &ClientEvent::WhiteboardUpdate {
                document: WhiteboardDocument::default(),
                clear_token: Some(7),
            },
        )
        .await;

    let events = bob.drain();
    assert!(matches!(
        events.as_slice(),
        [ServerEvent::WhiteboardUpdate { document, clear_token: Some(7) }] if document.is_empty()
    ));

    // The token survives into the join snapshot for late arrivals.
    let mut carol = Conn::new();
    let replies = join(&state, &mut carol, &key, "carol").await;
    match replies.first() {
        Some(ServerEvent::RoomJoined { whiteboard_clear_token, .. }) => {
            assert_eq!(*whiteboard_clear_token, Some(7));
        }
        other => panic!("expected room-joined snapshot, got {other:?}"),
    }
}

#[tokio::test]
async fn execution_result_reaches_everyone_including_origin() {
    let state = test_app_state();
    let mut alice = Conn::new();
    let key = create(&state, &mut alice, "alice").await;
    let mut bob = Conn::new();
    join(&state, &mut bob, &key, "bob").await;
    alice.drain();
    bob.drain();

    let result = ExecutionResult {
        output: "42\n".to_owned(),
        status: "success".to_owned(),
        elapsed_time: "0.03s".to_owned(),
        memory_used: "8 MB".to_owned(),
    };
    alice
        .send(&state, &ClientEvent::ExecutionResultUpdate { result: result.clone() })
        .await;

    for conn in [&mut alice, &mut bob] {
        let events = conn.drain();
        assert!(matches!(
            events.as_slice(),
            [ServerEvent::ExecutionResultUpdate { result: r }] if *r == result
        ));
    }
}

// =============================================================================
// STATE REQUESTS
// =============================================================================

#[tokio::test]
async fn whiteboard_state_request_unicasts_to_requester() {
    let state = test_app_state();
    let mut alice = Conn::new();
    let key = create(&state, &mut alice, "alice").await;
    let mut bob = Conn::new();
    join(&state, &mut bob, &key, "bob").await;
    alice.drain();
    bob.drain();

    let board = one_stroke_board();
    alice
        .send(
            &state,
            &ClientEvent::WhiteboardUpdate { document: board.clone(), clear_token: None },
        )
        .await;
    bob.drain();

    let replies = bob
        .send(&state, &ClientEvent::RequestWhiteboardState { room_key: key.clone() })
        .await;
    assert!(matches!(
        replies.as_slice(),
        [ServerEvent::WhiteboardState { document, clear_token: None }] if *document == board
    ));
    // A reply, not a broadcast.
    assert!(alice.drain().is_empty());
}

#[tokio::test]
async fn flowchart_state_request_returns_current_document() {
    let state = test_app_state();
    let mut alice = Conn::new();
    let key = create(&state, &mut alice, "alice").await;

    let elements = vec![events::FlowchartElement {
        id: "n1".to_owned(),
        kind: "function".to_owned(),
        label: "main".to_owned(),
        line: 1,
    }];
    alice
        .send(
            &state,
            &ClientEvent::FlowchartUpdate {
                elements: elements.clone(),
                render_source: "graph TD; n1".to_owned(),
            },
        )
        .await;

    let replies = alice
        .send(&state, &ClientEvent::RequestFlowchartState { room_key: key })
        .await;
    match replies.as_slice() {
        [ServerEvent::FlowchartState { elements: got, render_source }] => {
            assert_eq!(got, &elements);
            assert_eq!(render_source, "graph TD; n1");
        }
        other => panic!("expected flowchart-state, got {other:?}"),
    }
}

#[tokio::test]
async fn state_request_for_unknown_room_is_silent() {
    let state = test_app_state();
    let mut alice = Conn::new();

    let replies = alice
        .send(
            &state,
            &ClientEvent::RequestWhiteboardState { room_key: "deadbeef".to_owned() },
        )
        .await;
    assert!(replies.is_empty());
}

// =============================================================================
// DROPPED EVENTS
// =============================================================================

#[tokio::test]
async fn malformed_payload_is_dropped_without_reply() {
    let state = test_app_state();
    let mut alice = Conn::new();
    let key = create(&state, &mut alice, "alice").await;
    alice.drain();

    for bad in ["not json", "{}", r#"{"event":"no-such-event"}"#, r#"{"event":"join-room"}"#] {
        let replies = alice.send_raw(&state, bad).await;
        assert!(replies.is_empty(), "payload {bad:?} must be dropped");
    }

    // The session and room survive untouched.
    assert!(matches!(alice.session, Session::Bound { .. }));
    assert!(state.registry.contains(&key).await);
    assert!(alice.drain().is_empty());
}

#[tokio::test]
async fn document_updates_outside_a_room_are_dropped() {
    let state = test_app_state();
    let mut alice = Conn::new();

    let replies = alice
        .send(
            &state,
            &ClientEvent::CodeUpdate {
                text: "x".to_owned(),
                language: "python".to_owned(),
                origin: String::new(),
            },
        )
        .await;
    assert!(replies.is_empty());
    assert_eq!(alice.session, Session::Unbound);
}

// =============================================================================
// SOCKET END-TO-END
// =============================================================================

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

async fn recv_server_event(ws: &mut WsStream) -> ServerEvent {
    use futures_util::StreamExt;
    use tokio_tungstenite::tungstenite::Message;

    let msg = tokio::time::timeout(std::time::Duration::from_millis(500), ws.next())
        .await
        .expect("ws receive timed out")
        .expect("ws stream ended")
        .expect("ws read failed");
    match msg {
        Message::Text(text) => events::decode_server_event(&text).expect("valid server event"),
        other => panic!("unexpected ws message: {other:?}"),
    }
}

#[tokio::test]
async fn socket_lifecycle_end_to_end() {
    use futures_util::SinkExt;
    use tokio::time::{Duration, sleep};
    use tokio_tungstenite::tungstenite::Message;

    let state = test_app_state();
    let app = crate::routes::app(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
        .await
        .expect("ws connect");

    // The server introduces us with our connection id.
    let connection_id = match recv_server_event(&mut ws).await {
        ServerEvent::Connected { connection_id } => connection_id,
        other => panic!("expected connected first, got {other:?}"),
    };

    let create = encode_client_event(&ClientEvent::CreateRoom { identity: "alice".to_owned() });
    ws.send(Message::Text(create.into())).await.unwrap();

    let room_key = match recv_server_event(&mut ws).await {
        ServerEvent::RoomCreated { room_key, participants } => {
            assert_eq!(participants.len(), 1);
            assert_eq!(participants[0].connection_id, connection_id);
            room_key
        }
        other => panic!("expected room-created, got {other:?}"),
    };
    assert!(matches!(
        recv_server_event(&mut ws).await,
        ServerEvent::ParticipantsChanged { participants } if participants.len() == 1
    ));
    assert!(state.registry.contains(&room_key).await);

    // Dropping the socket counts as a leave and tears the room down.
    drop(ws);
    for _ in 0..50 {
        if !state.registry.contains(&room_key).await {
            return;
        }
        sleep(Duration::from_millis(20)).await;
    }
    panic!("room survived its last participant's disconnect");
}

#[tokio::test]
async fn creating_while_bound_leaves_the_old_room() {
    let state = test_app_state();
    let mut alice = Conn::new();
    let first = create(&state, &mut alice, "alice").await;
    let mut bob = Conn::new();
    join(&state, &mut bob, &first, "bob").await;
    bob.drain();

    let second = create(&state, &mut alice, "alice").await;
    assert_ne!(first, second);

    // Bob is now alone in the first room.
    let events = bob.drain();
    assert!(matches!(
        events.as_slice(),
        [ServerEvent::ParticipantsChanged { participants }] if participants.len() == 1
    ));
    let roster = state.registry.roster(&first).await.unwrap();
    assert_eq!(roster.len(), 1);
}
