//! Flowchart reconciliation.
//!
//! The flowchart is a derived view of the shared code: an external parser
//! turns source text into structural elements plus a renderer description.
//! Parsing sits behind a trait so the sync machine stays testable without
//! a real parser. Only the result is replicated; peers render the received
//! document as-is and never re-parse.

use events::{ClientEvent, FlowchartDocument, FlowchartElement};
use tokio::time::{Duration, Instant};

use crate::sync::{Cooldown, Debounce};

pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(300);
pub const REMOTE_APPLY_COOLDOWN: Duration = Duration::from_millis(100);

/// Turns source text into a flowchart document. Implementations are
/// expected to be total: unparseable code yields an empty document, not an
/// error.
pub trait FlowchartParser {
    fn parse(&self, text: &str, language: &str) -> FlowchartDocument;
}

impl<F> FlowchartParser for F
where
    F: Fn(&str, &str) -> FlowchartDocument,
{
    fn parse(&self, text: &str, language: &str) -> FlowchartDocument {
        self(text, language)
    }
}

/// Reconciliation machine for the flowchart surface.
pub struct FlowchartSync<P> {
    parser: P,
    document: FlowchartDocument,
    /// Source text waiting to be parsed once the debounce settles.
    pending: Option<(String, String)>,
    debounce: Debounce,
    cooldown: Cooldown,
}

impl<P: FlowchartParser> FlowchartSync<P> {
    pub fn new(parser: P) -> Self {
        Self {
            parser,
            document: FlowchartDocument::default(),
            pending: None,
            debounce: Debounce::new(DEBOUNCE_WINDOW),
            cooldown: Cooldown::new(REMOTE_APPLY_COOLDOWN),
        }
    }

    #[must_use]
    pub fn document(&self) -> &FlowchartDocument {
        &self.document
    }

    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.debounce.deadline()
    }

    /// The shared code changed; schedule a re-parse. Parsing is deferred to
    /// the flush so a typing burst costs one parse, not one per keystroke.
    pub fn code_changed(&mut self, text: &str, language: &str) {
        if self.cooldown.active() {
            return;
        }
        self.pending = Some((text.to_owned(), language.to_owned()));
        self.debounce.touch();
    }

    /// Parse the settled source and take the resulting update.
    pub fn flush(&mut self) -> Option<ClientEvent> {
        if !self.debounce.flush_due() {
            return None;
        }
        let (text, language) = self.pending.take()?;
        self.document = self.parser.parse(&text, &language);
        Some(ClientEvent::FlowchartUpdate {
            elements: self.document.elements.clone(),
            render_source: self.document.render_source.clone(),
        })
    }

    /// Apply a peer's parsed document verbatim.
    pub fn apply_remote(&mut self, elements: Vec<FlowchartElement>, render_source: String) {
        self.document = FlowchartDocument { elements, render_source };
        self.pending = None;
        self.debounce.cancel();
        self.cooldown.arm();
    }

    /// Hydrate from a join snapshot or a `flowchart-state` reply.
    pub fn hydrate(&mut self, document: FlowchartDocument) {
        self.document = document;
        self.pending = None;
        self.debounce.cancel();
    }
}

#[cfg(test)]
#[path = "flowchart_test.rs"]
mod tests;
