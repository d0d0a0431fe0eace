use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::debug;

use crate::gesture::{classify_selection, GestureSignal, TapDetector, WordSelection};
use crate::lookup::DefinitionResult;
use crate::registry::{DocumentRecord, DocumentRegistry};
use crate::{DocumentId, Point, Rect};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("document {0} not found")]
    NotFound(DocumentId),
}

#[derive(Debug, Clone)]
pub enum ReaderCommand {
    Tap { at: Instant },
    SelectText { text: String, bounds: Rect },
    CloseLookup,
    DismissOverlay,
    ToggleDarkMode,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReaderEvent {
    OverlayToggled(bool),
    SelectionChanged(Option<String>),
    DefinitionUpdated(String),
    ThemeChanged { dark_mode: bool },
}

/// Identifies one in-flight lookup. A result is only applied while its
/// ticket is still the live one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupTicket {
    pub word: String,
    pub generation: u64,
}

/// Ephemeral state for one open document.
pub struct ReaderSession {
    document_id: DocumentId,
    overlay_visible: bool,
    dark_mode: bool,
    taps: TapDetector,
    selection: Option<WordSelection>,
    definition: DefinitionResult,
    generation: u64,
    events: Arc<Mutex<Vec<ReaderEvent>>>,
}

impl ReaderSession {
    pub fn open(registry: &DocumentRegistry, id: DocumentId) -> Result<Self, SessionError> {
        Self::open_with(registry, id, TapDetector::default())
    }

    pub fn open_with(
        registry: &DocumentRegistry,
        id: DocumentId,
        taps: TapDetector,
    ) -> Result<Self, SessionError> {
        if registry.get(id).is_none() {
            return Err(SessionError::NotFound(id));
        }
        debug!(%id, "reader session opened");
        Ok(Self {
            document_id: id,
            overlay_visible: false,
            dark_mode: false,
            taps,
            selection: None,
            definition: DefinitionResult::Idle,
            generation: 0,
            events: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn document_id(&self) -> DocumentId {
        self.document_id
    }

    /// Resolves the record again; fails once it has been removed.
    pub fn document(&self, registry: &DocumentRegistry) -> Result<DocumentRecord, SessionError> {
        registry
            .get(self.document_id)
            .ok_or(SessionError::NotFound(self.document_id))
    }

    pub fn events(&self) -> Arc<Mutex<Vec<ReaderEvent>>> {
        Arc::clone(&self.events)
    }

    pub fn overlay_visible(&self) -> bool {
        self.overlay_visible
    }

    pub fn dark_mode(&self) -> bool {
        self.dark_mode
    }

    pub fn set_dark_mode(&mut self, dark_mode: bool) {
        self.dark_mode = dark_mode;
    }

    pub fn pending_taps(&self) -> u32 {
        self.taps.pending_taps()
    }

    pub fn selection(&self) -> Option<&WordSelection> {
        self.selection.as_ref()
    }

    pub fn selected_word(&self) -> Option<&str> {
        self.selection.as_ref().map(|s| s.word.as_str())
    }

    pub fn selected_position(&self) -> Option<Point> {
        self.selection.as_ref().map(|s| s.position)
    }

    pub fn definition(&self) -> &DefinitionResult {
        &self.definition
    }

    /// Applies one input. Returns a ticket when a new word needs a lookup;
    /// the caller runs it and hands the outcome back through [`Self::resolve`].
    pub fn apply(&mut self, command: ReaderCommand) -> Option<LookupTicket> {
        match command {
            ReaderCommand::Tap { at } => {
                if let Some(signal) = self.taps.on_tap(at) {
                    return self.handle_signal(signal);
                }
                None
            }
            ReaderCommand::SelectText { text, bounds } => {
                let selection = classify_selection(&text, bounds)?;
                self.handle_signal(GestureSignal::WordSelected(selection))
            }
            ReaderCommand::CloseLookup => {
                self.close_lookup();
                None
            }
            ReaderCommand::DismissOverlay => {
                if self.overlay_visible {
                    self.overlay_visible = false;
                    self.events.lock().push(ReaderEvent::OverlayToggled(false));
                }
                None
            }
            ReaderCommand::ToggleDarkMode => {
                self.dark_mode = !self.dark_mode;
                self.events.lock().push(ReaderEvent::ThemeChanged {
                    dark_mode: self.dark_mode,
                });
                None
            }
        }
    }

    pub fn handle_signal(&mut self, signal: GestureSignal) -> Option<LookupTicket> {
        match signal {
            GestureSignal::TripleTap => {
                self.overlay_visible = !self.overlay_visible;
                debug!(visible = self.overlay_visible, "overlay toggled");
                self.events
                    .lock()
                    .push(ReaderEvent::OverlayToggled(self.overlay_visible));
                None
            }
            GestureSignal::WordSelected(selection) => self.select(selection),
        }
    }

    /// Fires the tap reset timer when the host loop notices it has elapsed.
    pub fn tick(&mut self, now: Instant) {
        if self.taps.expire(now) {
            debug!("pending taps expired");
        }
    }

    /// Applies a finished lookup. Results for a word that is no longer
    /// selected, for a superseded request, or for a lookup that already
    /// resolved are dropped.
    pub fn resolve(&mut self, ticket: &LookupTicket, result: DefinitionResult) -> bool {
        let live = ticket.generation == self.generation
            && self.selected_word() == Some(ticket.word.as_str())
            && !self.definition.is_terminal();
        if !live {
            debug!(
                word = %ticket.word,
                generation = ticket.generation,
                current = ?self.selected_word(),
                "discarding stale definition result"
            );
            return false;
        }
        self.definition = result;
        self.events
            .lock()
            .push(ReaderEvent::DefinitionUpdated(ticket.word.clone()));
        true
    }

    fn select(&mut self, selection: WordSelection) -> Option<LookupTicket> {
        let changed = self.selected_word() != Some(selection.word.as_str());
        let word = selection.word.clone();
        self.selection = Some(selection);
        if !changed {
            return None;
        }

        self.generation += 1;
        self.definition = DefinitionResult::Loading;
        self.events
            .lock()
            .push(ReaderEvent::SelectionChanged(Some(word.clone())));
        debug!(%word, generation = self.generation, "word selected");
        Some(LookupTicket {
            word,
            generation: self.generation,
        })
    }

    fn close_lookup(&mut self) {
        if self.selection.take().is_none() {
            return;
        }
        // Any lookup still in flight now belongs to a dead generation.
        self.generation += 1;
        self.definition = DefinitionResult::Idle;
        self.events.lock().push(ReaderEvent::SelectionChanged(None));
    }
}
