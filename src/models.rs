use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// The fixed, mutually exclusive classification labels
pub const CLASSIFICATION_LABELS: [&str; 5] = ["ATTN", "FK-U", "MARKETING", "TAKE-A-LOOK", "HMMMM"];

/// Applied when the classifier's category cannot be resolved to a label
pub const FALLBACK_LABEL: &str = "HMMMM";

/// Category reported when classification failed
pub const ERROR_CATEGORY: &str = "ERROR";

pub const NO_SUBJECT: &str = "No Subject";
pub const NO_SENDER: &str = "No Sender";
pub const NO_DATE: &str = "No Date";
pub const NO_CONTENT: &str = "No content";

/// Returns the canonical LabelSet name for a category, ignoring case and
/// surrounding whitespace
pub fn canonical_label(category: &str) -> Option<&'static str> {
    let wanted = category.trim();
    CLASSIFICATION_LABELS
        .iter()
        .copied()
        .find(|label| label.eq_ignore_ascii_case(wanted))
}

pub fn is_classification_label(name: &str) -> bool {
    canonical_label(name).is_some()
}

/// A message snapshot fetched for one processing pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub id: String,
    pub sender: String,
    pub subject: String,
    pub date: String,
    /// Decoded text of the primary body part, `None` when the part had no data
    pub body: Option<String>,
    pub label_ids: Vec<String>,
}

impl EmailMessage {
    /// True if any of the given label ids is applied to this message
    pub fn has_any_label(&self, label_ids: &HashSet<String>) -> bool {
        self.label_ids.iter().any(|id| label_ids.contains(id))
    }
}

/// Structured answer of the classification service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub classification: String,
    #[serde(default)]
    pub reason: String,
}

impl ClassificationResult {
    pub fn error(reason: impl Into<String>) -> Self {
        Self {
            classification: ERROR_CATEGORY.to_string(),
            reason: reason.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.classification == ERROR_CATEGORY
    }
}
