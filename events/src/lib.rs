//! Shared event model and JSON codec for the realtime WS transport.
//!
//! This crate owns the wire representation used by both the `collabcode`
//! server and the `client` reconciliation layer. Every event kind is a
//! tagged variant with a fixed schema; payload shape mismatches are decode
//! errors, never silently-missing fields.

use serde::{Deserialize, Serialize};

// =============================================================================
// DOCUMENTS
// =============================================================================

/// Shared code buffer plus its language tag. The pair is always replaced
/// together: a language change resets the text to that language's template.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeDocument {
    pub text: String,
    pub language: String,
}

impl Default for CodeDocument {
    fn default() -> Self {
        Self { text: String::new(), language: "python".to_owned() }
    }
}

/// One point of a freehand stroke.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct StrokePoint {
    pub x: f64,
    pub y: f64,
}

/// A freehand polyline drawn with the pen or eraser tool.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub id: String,
    pub points: Vec<StrokePoint>,
    pub color: String,
    pub size: f64,
    pub tool: String,
}

/// A positioned editable text box.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextBox {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub text: String,
    pub color: String,
}

/// A positioned geometric shape (rectangle, circle, line).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub id: String,
    pub kind: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub color: String,
}

/// The whiteboard contents: three element collections, replaced wholesale
/// on every update (last write wins, no per-element merge).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WhiteboardDocument {
    pub lines: Vec<Stroke>,
    pub text_boxes: Vec<TextBox>,
    pub shapes: Vec<Shape>,
}

impl WhiteboardDocument {
    /// True when every element collection is empty. An all-empty document
    /// broadcast with a clear token is an authoritative clear; without one
    /// it is indistinguishable from not-yet-synced state.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty() && self.text_boxes.is_empty() && self.shapes.is_empty()
    }
}

/// One labeled structural node extracted from source text by the external
/// code parser. Opaque to the sync core; replicated verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowchartElement {
    pub id: String,
    pub kind: String,
    pub label: String,
    pub line: u32,
}

/// Flowchart view of the shared code: parsed elements plus the opaque
/// diagram-description string the renderer consumes. Always replaced
/// wholesale, never merged element-by-element.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowchartDocument {
    pub elements: Vec<FlowchartElement>,
    pub render_source: String,
}

/// One room member as seen on the wire. `connection_id` is ephemeral and
/// reassigned on every reconnect; `identity` is the durable key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub connection_id: String,
    pub identity: String,
}

/// Outcome of one run against the external execution service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub output: String,
    pub status: String,
    pub elapsed_time: String,
    pub memory_used: String,
}

// =============================================================================
// EVENTS
// =============================================================================

/// Why a room request was refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoomErrorReason {
    NotFound,
    AlreadyExists,
}

/// Everything a client may send to the server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ClientEvent {
    CreateRoom {
        identity: String,
    },
    JoinRoom {
        room_key: String,
        identity: String,
    },
    CodeUpdate {
        text: String,
        language: String,
        /// Originating connection id, echoed back so receivers can
        /// suppress their own edits.
        origin: String,
    },
    LanguageUpdate {
        text: String,
        language: String,
        origin: String,
    },
    WhiteboardUpdate {
        document: WhiteboardDocument,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        clear_token: Option<u64>,
    },
    FlowchartUpdate {
        elements: Vec<FlowchartElement>,
        render_source: String,
    },
    RequestWhiteboardState {
        room_key: String,
    },
    RequestFlowchartState {
        room_key: String,
    },
    LeaveRoom,
    ExecutionResultUpdate {
        result: ExecutionResult,
    },
}

/// Everything the server may send to a client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// Sent exactly once after upgrade so the client learns its own
    /// transport-assigned connection id.
    Connected {
        connection_id: String,
    },
    RoomCreated {
        room_key: String,
        participants: Vec<Participant>,
    },
    /// Full snapshot delivered to the (re)joining client so it can hydrate
    /// without waiting for the next broadcast.
    RoomJoined {
        room_key: String,
        participants: Vec<Participant>,
        code: CodeDocument,
        whiteboard: WhiteboardDocument,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        whiteboard_clear_token: Option<u64>,
        flowchart: FlowchartDocument,
    },
    RoomError {
        reason: RoomErrorReason,
    },
    ParticipantsChanged {
        participants: Vec<Participant>,
    },
    CodeUpdate {
        text: String,
        language: String,
        origin: String,
    },
    LanguageUpdate {
        text: String,
        language: String,
        origin: String,
    },
    WhiteboardUpdate {
        document: WhiteboardDocument,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        clear_token: Option<u64>,
    },
    FlowchartUpdate {
        elements: Vec<FlowchartElement>,
        render_source: String,
    },
    WhiteboardState {
        document: WhiteboardDocument,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        clear_token: Option<u64>,
    },
    FlowchartState {
        elements: Vec<FlowchartElement>,
        render_source: String,
    },
    ExecutionResultUpdate {
        result: ExecutionResult,
    },
}

// =============================================================================
// CODEC
// =============================================================================

/// Error returned by [`decode_client_event`] and [`decode_server_event`].
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The text is not valid JSON or does not match any event schema.
    #[error("malformed event payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Encode a client event as JSON text. The event enums contain nothing
/// `serde_json` can fail to serialize, so encoding is infallible.
#[must_use]
pub fn encode_client_event(event: &ClientEvent) -> String {
    serde_json::to_string(event).unwrap_or_default()
}

/// Encode a server event as JSON text.
#[must_use]
pub fn encode_server_event(event: &ServerEvent) -> String {
    serde_json::to_string(event).unwrap_or_default()
}

/// Decode JSON text into a client event.
///
/// # Errors
///
/// Returns [`CodecError::Malformed`] for invalid JSON, unknown event tags,
/// and payloads missing required fields.
pub fn decode_client_event(text: &str) -> Result<ClientEvent, CodecError> {
    Ok(serde_json::from_str(text)?)
}

/// Decode JSON text into a server event.
///
/// # Errors
///
/// Returns [`CodecError::Malformed`] for invalid JSON, unknown event tags,
/// and payloads missing required fields.
pub fn decode_server_event(text: &str) -> Result<ServerEvent, CodecError> {
    Ok(serde_json::from_str(text)?)
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
