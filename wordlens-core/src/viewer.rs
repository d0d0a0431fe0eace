use crate::registry::{format_file_size, DocumentRecord};
use crate::DocumentFormat;

/// Plain text handed to the host for painting.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerPage {
    pub title: String,
    pub lines: Vec<String>,
}

/// Renders a document of one format. The host feeds taps and selections
/// made over the page back into the reader session.
pub trait DocumentViewer: Send + Sync {
    fn format(&self) -> DocumentFormat;
    fn render(&self, document: &DocumentRecord) -> ViewerPage;
}

const USAGE_HINTS: [&str; 2] = [
    "Triple-tap anywhere to show the menu bar.",
    "Select a single word to look up its definition.",
];

#[derive(Debug, Default, Clone, Copy)]
pub struct PdfViewer;

impl DocumentViewer for PdfViewer {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Pdf
    }

    fn render(&self, document: &DocumentRecord) -> ViewerPage {
        let mut lines = vec![
            "PDF Viewer".to_string(),
            String::new(),
            document.name.clone(),
            format!("Size: {}", format_file_size(document.size_bytes)),
            format!("Source: {}", document.source_ref),
            String::new(),
        ];
        lines.extend(USAGE_HINTS.iter().map(|hint| hint.to_string()));
        ViewerPage {
            title: document.name.clone(),
            lines,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DocxViewer;

impl DocumentViewer for DocxViewer {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Docx
    }

    fn render(&self, document: &DocumentRecord) -> ViewerPage {
        let mut lines = vec![
            "DOCX Document".to_string(),
            String::new(),
            format!("File: {}", document.name),
            format!("Size: {}", format_file_size(document.size_bytes)),
            String::new(),
            "Paragraph content is shown here once the document body is parsed.".to_string(),
            String::new(),
        ];
        lines.extend(USAGE_HINTS.iter().map(|hint| hint.to_string()));
        ViewerPage {
            title: document.name.clone(),
            lines,
        }
    }
}

pub fn viewer_for(format: DocumentFormat) -> &'static dyn DocumentViewer {
    match format {
        DocumentFormat::Pdf => &PdfViewer,
        DocumentFormat::Docx => &DocxViewer,
    }
}
