use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::registry::{DocumentRecord, DocumentRegistry};
use crate::DocumentFormat;

/// What the host picker reports for one chosen file.
#[derive(Debug, Clone, PartialEq)]
pub struct PickedFile {
    pub name: String,
    pub locator: String,
    pub mime_hint: Option<String>,
    pub size_bytes: u64,
}

/// A file the picker could not hand over, with the reason.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedFile {
    pub locator: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PickOutcome {
    Cancelled,
    Picked {
        files: Vec<PickedFile>,
        rejected: Vec<RejectedFile>,
    },
}

impl PickOutcome {
    pub fn picked(files: Vec<PickedFile>) -> Self {
        PickOutcome::Picked {
            files,
            rejected: Vec::new(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("failed to select documents: {0}")]
    Picker(String),
    #[error("unsupported file type: {0}")]
    Unsupported(String),
}

#[async_trait]
pub trait FilePicker: Send + Sync {
    async fn pick(&self) -> Result<PickOutcome, ImportError>;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportSummary {
    pub cancelled: bool,
    pub picked: usize,
    pub records: Vec<DocumentRecord>,
    pub rejected: Vec<RejectedFile>,
}

impl ImportSummary {
    pub fn message(&self) -> Option<String> {
        if self.cancelled {
            return None;
        }
        let added = format!("Added {} document(s) to your library", self.picked);
        match self.rejected.as_slice() {
            [] => Some(added),
            [only] => Some(format!("{added}; skipped {}", only.reason)),
            many => Some(format!("{added}; skipped {} file(s)", many.len())),
        }
    }
}

/// Runs the picker and adds every chosen file. A cancelled pick is not an
/// error; a failing picker leaves the registry untouched. Files the picker
/// rejected are carried into the summary.
#[instrument(skip_all)]
pub async fn import_documents<P: FilePicker + ?Sized>(
    registry: &mut DocumentRegistry,
    picker: &P,
) -> Result<ImportSummary, ImportError> {
    let (files, rejected) = match picker.pick().await? {
        PickOutcome::Cancelled => {
            return Ok(ImportSummary {
                cancelled: true,
                ..ImportSummary::default()
            })
        }
        PickOutcome::Picked { files, rejected } => (files, rejected),
    };

    let picked = files.len();
    let records = files
        .into_iter()
        .map(|file| {
            let format = DocumentFormat::from_mime_hint(file.mime_hint.as_deref());
            registry.add(file.name, file.locator, format, file.size_bytes)
        })
        .collect();
    info!(
        picked,
        rejected = rejected.len(),
        total = registry.len(),
        "import finished"
    );
    Ok(ImportSummary {
        cancelled: false,
        picked,
        records,
        rejected,
    })
}

/// Picks a fixed list of filesystem paths; used when files are named on
/// the command line instead of chosen in a dialog. Paths that are missing
/// or of an unsupported type are rejected one by one.
#[derive(Debug, Clone, Default)]
pub struct PathPicker {
    paths: Vec<PathBuf>,
}

impl PathPicker {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }

    fn describe(path: &Path) -> Result<PickedFile, ImportError> {
        let mime = mime_for_path(path)
            .ok_or_else(|| ImportError::Unsupported(path.display().to_string()))?;
        let absolute = path
            .canonicalize()
            .map_err(|err| ImportError::Picker(format!("{}: {}", path.display(), err)))?;
        let metadata = fs::metadata(&absolute)
            .map_err(|err| ImportError::Picker(format!("{}: {}", absolute.display(), err)))?;
        let name = absolute
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| absolute.display().to_string());
        Ok(PickedFile {
            name,
            locator: absolute.to_string_lossy().into_owned(),
            mime_hint: Some(mime.to_string()),
            size_bytes: metadata.len(),
        })
    }
}

#[async_trait]
impl FilePicker for PathPicker {
    async fn pick(&self) -> Result<PickOutcome, ImportError> {
        if self.paths.is_empty() {
            return Ok(PickOutcome::Cancelled);
        }
        let mut files = Vec::new();
        let mut rejected = Vec::new();
        for path in &self.paths {
            match Self::describe(path) {
                Ok(file) => files.push(file),
                Err(err) => {
                    warn!(path = %path.display(), %err, "skipping file");
                    rejected.push(RejectedFile {
                        locator: path.display().to_string(),
                        reason: err.to_string(),
                    });
                }
            }
        }
        Ok(PickOutcome::Picked { files, rejected })
    }
}

pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let format = match ext.as_str() {
        "pdf" => DocumentFormat::Pdf,
        "docx" => DocumentFormat::Docx,
        _ => return None,
    };
    Some(format.mime_type())
}
