//! File classification
//!
//! ## Architecture
//!
//! ```text
//! Classifier (trait)        batch / content / description variants
//!   └─ GeminiClassifier     generateContent over HTTPS
//!        ├─ prompts.rs      system instruction and request prompts
//!        ├─ json.rs         tolerant extraction of the JSON answer
//!        └─ budget.rs       cost ceiling and request spacing
//! ClassificationCache       (name|content-type) → Suggestion, per run
//! ```

pub mod budget;
pub mod cache;
pub mod gemini;
pub mod json;
pub mod prompts;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::drive::RemoteItem;
use crate::error::ClassifyError;

pub use cache::ClassificationCache;
pub use gemini::GeminiClassifier;

/// Folder used when the AI returns nothing usable
pub const FALLBACK_FOLDER: &str = "Outros";

/// Longest supplementary text (content or description) sent with a request
pub const MAX_CONTEXT_CHARS: usize = 2000;

/// AI output for one file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub suggested_folder: String,
    #[serde(default)]
    pub suggested_name: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub needs_content: bool,
}

impl Suggestion {
    /// Placeholder returned when classification produced no answer
    pub fn fallback(filename: &str) -> Self {
        Self {
            filename: filename.to_string(),
            suggested_folder: FALLBACK_FOLDER.to_string(),
            suggested_name: String::new(),
            reason: "Could not classify".to_string(),
            confidence: 0.0,
            needs_content: false,
        }
    }

    /// Name the file should end up with: the suggested one when present
    /// and different, otherwise the original
    pub fn target_name<'a>(&'a self, original: &'a str) -> &'a str {
        if self.renames(original) {
            &self.suggested_name
        } else {
            original
        }
    }

    /// Whether the suggestion proposes a new name for `original`
    pub fn renames(&self, original: &str) -> bool {
        let name = self.suggested_name.trim();
        !name.is_empty() && name != original
    }

    /// Clamp confidence into [0, 1] and fall back to `Outros` for an empty folder
    pub fn normalized(mut self) -> Self {
        self.confidence = if self.confidence.is_finite() {
            self.confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.suggested_folder = self.suggested_folder.trim().trim_matches('/').to_string();
        if self.suggested_folder.is_empty() {
            self.suggested_folder = FALLBACK_FOLDER.to_string();
        }
        self.suggested_name = self.suggested_name.trim().to_string();
        self
    }
}

/// Metadata sent to the classifier for one file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileMetadata {
    pub name: String,
    pub mime_type: String,
    pub size: Option<u64>,
    pub created_time: Option<DateTime<Utc>>,
    pub modified_time: Option<DateTime<Utc>>,
}

impl From<&RemoteItem> for FileMetadata {
    fn from(item: &RemoteItem) -> Self {
        Self {
            name: item.name.clone(),
            mime_type: item.mime_type.clone(),
            size: item.classification_size(),
            created_time: item.created_time,
            modified_time: item.modified_time,
        }
    }
}

/// Cache key for a file: `name|content-type`
pub fn cache_key(name: &str, mime_type: &str) -> String {
    format!("{}|{}", name, mime_type)
}

/// Cut `text` to at most `MAX_CONTEXT_CHARS` characters, marking the cut
pub fn truncate_context(text: &str) -> String {
    if text.chars().count() <= MAX_CONTEXT_CHARS {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(MAX_CONTEXT_CHARS).collect();
    cut.push_str("... [truncated]");
    cut
}

/// The external classification collaborator
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Classify several files at once; one suggestion per file is expected
    /// but not guaranteed
    async fn classify_batch(
        &self,
        files: &[FileMetadata],
        existing_folders: &[String],
    ) -> Result<Vec<Suggestion>, ClassifyError>;

    async fn classify_with_content(
        &self,
        file: &FileMetadata,
        content: &str,
        existing_folders: &[String],
    ) -> Result<Suggestion, ClassifyError>;

    async fn classify_with_description(
        &self,
        file: &FileMetadata,
        description: &str,
        existing_folders: &[String],
    ) -> Result<Suggestion, ClassifyError>;

    async fn classify_single(
        &self,
        file: &FileMetadata,
        existing_folders: &[String],
    ) -> Result<Suggestion, ClassifyError> {
        let suggestions = self
            .classify_batch(std::slice::from_ref(file), existing_folders)
            .await?;
        Ok(pick_for(&file.name, suggestions))
    }
}

/// The suggestion for `name` out of a response: matched by filename, else
/// the first one, else the fallback
pub fn pick_for(name: &str, suggestions: Vec<Suggestion>) -> Suggestion {
    let mut first = None;
    for suggestion in suggestions {
        if suggestion.filename == name {
            return suggestion;
        }
        first.get_or_insert(suggestion);
    }
    first.unwrap_or_else(|| Suggestion::fallback(name))
}
