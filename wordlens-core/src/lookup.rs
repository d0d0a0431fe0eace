use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{instrument, warn};

pub const LOADING_MESSAGE: &str = "Looking up definition...";
pub const NOT_FOUND_MESSAGE: &str = "Word not found";

/// One element of the dictionary service's JSON array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DictionaryEntry {
    #[serde(default)]
    pub word: String,
    #[serde(default)]
    pub meanings: Vec<Meaning>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meaning {
    #[serde(default)]
    pub part_of_speech: String,
    #[serde(default)]
    pub definitions: Vec<Definition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Definition {
    pub definition: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SourceResponse {
    Entries(Vec<DictionaryEntry>),
    /// The service answered with a non-success status.
    NotFound,
}

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("network error: {0}")]
    Transport(String),
    #[error("malformed dictionary response: {0}")]
    Parse(String),
}

#[async_trait]
pub trait DefinitionSource: Send + Sync {
    /// Issues one query for an already normalized word.
    async fn fetch(&self, word: &str) -> Result<SourceResponse, LookupError>;
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum DefinitionResult {
    #[default]
    Idle,
    Loading,
    /// At most one meaning holding at most one definition.
    Found(Vec<Meaning>),
    NotFound,
    Error(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DefinitionSummary {
    pub part_of_speech: String,
    pub definition: String,
    pub example: Option<String>,
}

impl DefinitionResult {
    /// Keeps only the first entry's first meaning and that meaning's first
    /// definition; the popover shows a single concise definition.
    pub fn from_entries(entries: Vec<DictionaryEntry>) -> Self {
        let Some(entry) = entries.into_iter().next() else {
            return DefinitionResult::NotFound;
        };
        let meanings = entry
            .meanings
            .into_iter()
            .take(1)
            .map(|meaning| Meaning {
                part_of_speech: meaning.part_of_speech,
                definitions: meaning.definitions.into_iter().take(1).collect(),
            })
            .collect();
        DefinitionResult::Found(meanings)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DefinitionResult::Found(_) | DefinitionResult::NotFound | DefinitionResult::Error(_)
        )
    }

    pub fn summary(&self) -> Option<DefinitionSummary> {
        let DefinitionResult::Found(meanings) = self else {
            return None;
        };
        let meaning = meanings.first()?;
        let definition = meaning.definitions.first()?;
        Some(DefinitionSummary {
            part_of_speech: meaning.part_of_speech.clone(),
            definition: definition.definition.clone(),
            example: definition.example.clone(),
        })
    }

    /// Short text for the non-success states; `None` when there is a
    /// definition to show or nothing has been requested.
    pub fn status_message(&self) -> Option<String> {
        match self {
            DefinitionResult::Idle => None,
            DefinitionResult::Loading => Some(LOADING_MESSAGE.to_string()),
            DefinitionResult::NotFound => Some(NOT_FOUND_MESSAGE.to_string()),
            DefinitionResult::Error(message) => Some(message.clone()),
            DefinitionResult::Found(_) if self.summary().is_none() => {
                Some("No definition available".to_string())
            }
            DefinitionResult::Found(_) => None,
        }
    }
}

pub fn normalize_word(word: &str) -> String {
    word.trim().to_lowercase()
}

pub struct DefinitionLookup<S> {
    source: S,
}

impl<S: DefinitionSource> DefinitionLookup<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    #[cfg(test)]
    fn source(&self) -> &S {
        &self.source
    }

    /// Never fails: every outcome is folded into a terminal result.
    #[instrument(skip(self))]
    pub async fn lookup(&self, word: &str) -> DefinitionResult {
        let normalized = normalize_word(word);
        match self.source.fetch(&normalized).await {
            Ok(SourceResponse::Entries(entries)) => DefinitionResult::from_entries(entries),
            Ok(SourceResponse::NotFound) => DefinitionResult::NotFound,
            Err(err) => {
                warn!(%err, word = %normalized, "definition lookup failed");
                DefinitionResult::Error(err.to_string())
            }
        }
    }
}
