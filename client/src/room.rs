//! Client-side view of a room.
//!
//! `RoomView` is a plain mirror of what the server has told this client:
//! its own connection id, the room it is in, the roster, and the latest
//! documents. It does no timing or echo logic itself; the sync machines
//! own those rules and feed applied state back in.

use events::{
    CodeDocument, ExecutionResult, FlowchartDocument, Participant, RoomErrorReason, ServerEvent,
    WhiteboardDocument,
};

/// Where this client stands with respect to a room.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum RoomPhase {
    /// Connected, not in any room.
    #[default]
    Lobby,
    /// In a room.
    Joined { room_key: String },
    /// A create/join was refused.
    Refused { reason: RoomErrorReason },
}

#[derive(Debug, Default)]
pub struct RoomView {
    phase: RoomPhase,
    connection_id: Option<String>,
    participants: Vec<Participant>,
    code: CodeDocument,
    whiteboard: WhiteboardDocument,
    whiteboard_clear_token: Option<u64>,
    flowchart: FlowchartDocument,
    last_execution: Option<ExecutionResult>,
}

impl RoomView {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn phase(&self) -> &RoomPhase {
        &self.phase
    }

    /// Our connection id, once the server has sent `connected`.
    #[must_use]
    pub fn connection_id(&self) -> Option<&str> {
        self.connection_id.as_deref()
    }

    #[must_use]
    pub fn room_key(&self) -> Option<&str> {
        match &self.phase {
            RoomPhase::Joined { room_key } => Some(room_key),
            _ => None,
        }
    }

    #[must_use]
    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    #[must_use]
    pub fn code(&self) -> &CodeDocument {
        &self.code
    }

    #[must_use]
    pub fn whiteboard(&self) -> &WhiteboardDocument {
        &self.whiteboard
    }

    #[must_use]
    pub fn whiteboard_clear_token(&self) -> Option<u64> {
        self.whiteboard_clear_token
    }

    #[must_use]
    pub fn flowchart(&self) -> &FlowchartDocument {
        &self.flowchart
    }

    #[must_use]
    pub fn last_execution(&self) -> Option<&ExecutionResult> {
        self.last_execution.as_ref()
    }

    /// Leave the room locally. Server-side removal happens via the
    /// `leave-room` event or the transport closing.
    pub fn reset(&mut self) {
        let connection_id = self.connection_id.take();
        *self = Self { connection_id, ..Self::default() };
    }

    /// Fold one server event into the view.
    pub fn apply(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::Connected { connection_id } => {
                self.connection_id = Some(connection_id);
            }
            ServerEvent::RoomCreated { room_key, participants } => {
                self.phase = RoomPhase::Joined { room_key };
                self.participants = participants;
                self.code = CodeDocument::default();
                self.whiteboard = WhiteboardDocument::default();
                self.whiteboard_clear_token = None;
                self.flowchart = FlowchartDocument::default();
            }
            ServerEvent::RoomJoined {
                room_key,
                participants,
                code,
                whiteboard,
                whiteboard_clear_token,
                flowchart,
            } => {
                self.phase = RoomPhase::Joined { room_key };
                self.participants = participants;
                self.code = code;
                self.whiteboard = whiteboard;
                self.whiteboard_clear_token = whiteboard_clear_token;
                self.flowchart = flowchart;
            }
            ServerEvent::RoomError { reason } => {
                self.phase = RoomPhase::Refused { reason };
                self.participants.clear();
            }
            ServerEvent::ParticipantsChanged { participants } => {
                self.participants = participants;
            }
            ServerEvent::CodeUpdate { text, language, .. }
            | ServerEvent::LanguageUpdate { text, language, .. } => {
                self.code = CodeDocument { text, language };
            }
            ServerEvent::WhiteboardUpdate { document, clear_token }
            | ServerEvent::WhiteboardState { document, clear_token } => {
                self.whiteboard = document;
                if clear_token.is_some() {
                    self.whiteboard_clear_token = clear_token;
                }
            }
            ServerEvent::FlowchartUpdate { elements, render_source }
            | ServerEvent::FlowchartState { elements, render_source } => {
                self.flowchart = FlowchartDocument { elements, render_source };
            }
            ServerEvent::ExecutionResultUpdate { result } => {
                self.last_execution = Some(result);
            }
        }
    }
}

#[cfg(test)]
#[path = "room_test.rs"]
mod tests;
