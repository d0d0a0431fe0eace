use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{DocumentFormat, DocumentId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: DocumentId,
    pub name: String,
    pub source_ref: String,
    pub format: DocumentFormat,
    pub size_bytes: u64,
    pub added_at: DateTime<Utc>,
}

impl DocumentRecord {
    /// One-line description used by library listings, e.g. `PDF • 1.5 KB`.
    pub fn details(&self) -> String {
        format!("{} • {}", self.format, format_file_size(self.size_bytes))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    DocumentAdded(DocumentId),
    DocumentRemoved(DocumentId),
}

/// In-memory, insertion-ordered collection of imported documents.
///
/// The registry is the only owner of [`DocumentRecord`]s; everything else
/// holds a [`DocumentId`] and resolves it again when it needs the record.
/// Nothing here survives a restart.
#[derive(Debug, Default)]
pub struct DocumentRegistry {
    documents: Vec<DocumentRecord>,
    events: Arc<Mutex<Vec<RegistryEvent>>>,
}

impl DocumentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Arc<Mutex<Vec<RegistryEvent>>> {
        Arc::clone(&self.events)
    }

    /// Imports a document. A record that already uses `source_ref` is
    /// returned unchanged instead of creating a duplicate.
    pub fn add(
        &mut self,
        name: impl Into<String>,
        source_ref: impl Into<String>,
        format: DocumentFormat,
        size_bytes: u64,
    ) -> DocumentRecord {
        let source_ref = source_ref.into();
        if let Some(existing) = self.documents.iter().find(|d| d.source_ref == source_ref) {
            debug!(id = %existing.id, source_ref = %source_ref, "document already imported");
            return existing.clone();
        }

        let record = DocumentRecord {
            id: Uuid::new_v4(),
            name: name.into(),
            source_ref,
            format,
            size_bytes,
            added_at: Utc::now(),
        };
        info!(id = %record.id, name = %record.name, format = %record.format, "document imported");
        self.documents.push(record.clone());
        self.events
            .lock()
            .push(RegistryEvent::DocumentAdded(record.id));
        record
    }

    pub fn remove(&mut self, id: DocumentId) {
        let before = self.documents.len();
        self.documents.retain(|doc| doc.id != id);
        if self.documents.len() != before {
            info!(%id, "document removed");
            self.events.lock().push(RegistryEvent::DocumentRemoved(id));
        }
    }

    pub fn get(&self, id: DocumentId) -> Option<DocumentRecord> {
        self.documents.iter().find(|doc| doc.id == id).cloned()
    }

    pub fn list(&self) -> Vec<DocumentRecord> {
        self.documents.clone()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

pub fn library_summary(count: usize) -> String {
    if count == 1 {
        "1 document".to_string()
    } else {
        format!("{count} documents")
    }
}

const SIZE_UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

/// Human readable size in base 1024 with at most two decimals.
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut unit = 0;
    let mut value = bytes as f64;
    while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let mut rendered = format!("{value:.2}");
    if rendered.contains('.') {
        let trimmed = rendered.trim_end_matches('0').trim_end_matches('.').len();
        rendered.truncate(trimmed);
    }
    format!("{} {}", rendered, SIZE_UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn importing_same_source_twice_keeps_one_record() {
        let mut registry = DocumentRegistry::new();
        let first = registry.add("a.pdf", "file://a", DocumentFormat::Pdf, 1024);
        let second = registry.add("renamed.pdf", "file://a", DocumentFormat::Pdf, 9);

        assert_eq!(first, second);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.list()[0].name, "a.pdf");
        assert_eq!(
            *registry.events().lock(),
            vec![RegistryEvent::DocumentAdded(first.id)]
        );
    }

    #[test]
    fn add_then_remove_round_trip() {
        let mut registry = DocumentRegistry::new();
        assert!(registry.list().is_empty());

        let record = registry.add("a.pdf", "file://a", DocumentFormat::Pdf, 1024);
        let listed = registry.list();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "a.pdf");
        assert_eq!(listed[0].format, DocumentFormat::Pdf);
        assert_eq!(registry.get(record.id), Some(record.clone()));

        registry.remove(record.id);
        assert!(registry.list().is_empty());
        assert!(registry.get(record.id).is_none());
    }

    #[test]
    fn removing_unknown_id_is_a_noop() {
        let mut registry = DocumentRegistry::new();
        registry.add("a.pdf", "file://a", DocumentFormat::Pdf, 1);
        registry.events().lock().clear();

        registry.remove(Uuid::new_v4());

        assert_eq!(registry.len(), 1);
        assert!(registry.events().lock().is_empty());
    }

    #[test]
    fn list_preserves_insertion_order() {
        let mut registry = DocumentRegistry::new();
        registry.add("c.docx", "file://c", DocumentFormat::Docx, 3);
        registry.add("a.pdf", "file://a", DocumentFormat::Pdf, 1);
        registry.add("b.pdf", "file://b", DocumentFormat::Pdf, 2);

        let names: Vec<_> = registry.list().into_iter().map(|d| d.name).collect();
        assert_eq!(names, ["c.docx", "a.pdf", "b.pdf"]);
    }

    #[test]
    fn length_tracks_distinct_adds_minus_effective_removals() {
        let mut registry = DocumentRegistry::new();
        let mut live = Vec::new();
        let sources = ["x", "y", "x", "z", "y", "w"];

        for (step, source) in sources.iter().enumerate() {
            let record = registry.add(*source, *source, DocumentFormat::Docx, 0);
            if !live.contains(&record.id) {
                live.push(record.id);
            }
            if step % 2 == 1 {
                let victim = live.remove(0);
                registry.remove(victim);
                // A second removal of the same id must not change anything.
                registry.remove(victim);
            }
            assert_eq!(registry.len(), live.len());
        }
    }

    #[test]
    fn ids_are_unique() {
        let mut registry = DocumentRegistry::new();
        let a = registry.add("a", "file://a", DocumentFormat::Pdf, 0);
        let b = registry.add("b", "file://b", DocumentFormat::Pdf, 0);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn file_sizes_are_human_readable() {
        assert_eq!(format_file_size(0), "0 Bytes");
        assert_eq!(format_file_size(512), "512 Bytes");
        assert_eq!(format_file_size(1024), "1 KB");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(2_359_296), "2.25 MB");
        assert_eq!(format_file_size(3 * 1024 * 1024 * 1024), "3 GB");
        assert_eq!(format_file_size(2048 * 1024 * 1024 * 1024), "2048 GB");
    }

    #[test]
    fn library_summary_pluralizes() {
        assert_eq!(library_summary(0), "0 documents");
        assert_eq!(library_summary(1), "1 document");
        assert_eq!(library_summary(7), "7 documents");
    }

    #[test]
    fn record_details_combine_format_and_size() {
        let mut registry = DocumentRegistry::new();
        let record = registry.add("notes.docx", "file://n", DocumentFormat::Docx, 1536);
        assert_eq!(record.details(), "DOCX • 1.5 KB");
    }
}
