use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod config;
pub mod gesture;
pub mod import;
pub mod lookup;
pub mod registry;
pub mod session;
pub mod viewer;

pub use config::{Config, ConfigError, DictionaryConfig, GestureConfig};
pub use gesture::{classify_selection, GestureSignal, TapDetector, WordSelection};
pub use import::{
    import_documents, FilePicker, ImportError, ImportSummary, PathPicker, PickOutcome, PickedFile,
    RejectedFile,
};
pub use lookup::{
    Definition, DefinitionLookup, DefinitionResult, DefinitionSource, DefinitionSummary,
    DictionaryEntry, LookupError, Meaning, SourceResponse,
};
pub use registry::{
    format_file_size, library_summary, DocumentRecord, DocumentRegistry, RegistryEvent,
};
pub use session::{LookupTicket, ReaderCommand, ReaderEvent, ReaderSession, SessionError};
pub use viewer::{viewer_for, DocumentViewer, DocxViewer, PdfViewer, ViewerPage};

pub type DocumentId = Uuid;

pub const PDF_MIME: &str = "application/pdf";
pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Docx,
}

impl DocumentFormat {
    /// Anything that does not mention "pdf" is treated as DOCX; the picker
    /// only offers those two MIME types.
    pub fn from_mime_hint(hint: Option<&str>) -> Self {
        match hint {
            Some(mime) if mime.to_ascii_lowercase().contains("pdf") => DocumentFormat::Pdf,
            _ => DocumentFormat::Docx,
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            DocumentFormat::Pdf => PDF_MIME,
            DocumentFormat::Docx => DOCX_MIME,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "PDF",
            DocumentFormat::Docx => "DOCX",
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

/// Bounding region of a selection in viewer coordinates (y grows downwards).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Horizontal center of the top edge.
    pub fn top_center(&self) -> Point {
        Point {
            x: self.left + self.width / 2.0,
            y: self.top,
        }
    }
}
