//! Classification label setup and reconciliation
//!
//! The LabelSet labels are mutually exclusive: after a successful
//! [`LabelManager::reconcile`] a message carries at most one of them.

use std::collections::{HashMap, HashSet};
use tracing::{debug, error, info, warn};

use crate::client::{GmailClient, LabelInfo};
use crate::error::Result;
use crate::models::{canonical_label, CLASSIFICATION_LABELS, FALLBACK_LABEL};

/// What reconciliation left on the message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The requested label was applied
    Applied(String),
    /// The requested category did not resolve; the fallback label was applied
    Fallback(String),
    /// Neither the category nor the fallback resolved; no label was applied
    Unlabeled,
}

/// Creates the classification labels and keeps them exclusive on messages
pub struct LabelManager<'a> {
    client: &'a dyn GmailClient,
}

/// Map canonical LabelSet names to account label ids, ignoring other labels
fn classification_label_map(labels: Vec<LabelInfo>) -> HashMap<String, String> {
    labels
        .into_iter()
        .filter_map(|label| canonical_label(&label.name).map(|name| (name.to_string(), label.id)))
        .collect()
}

impl<'a> LabelManager<'a> {
    pub fn new(client: &'a dyn GmailClient) -> Self {
        Self { client }
    }

    /// Make sure every LabelSet label exists on the account, creating the
    /// missing ones. Returns the LabelSet name -> id mapping.
    pub async fn ensure_labels(&self) -> Result<HashMap<String, String>> {
        let mut label_map = classification_label_map(self.client.list_labels().await?);

        for name in CLASSIFICATION_LABELS {
            if label_map.contains_key(name) {
                debug!("Label '{}' already exists", name);
                continue;
            }

            let id = self.client.create_label(name).await?;
            info!("Created label: {}", name);
            label_map.insert(name.to_string(), id);
        }

        Ok(label_map)
    }

    /// Replace any LabelSet label on the message with the label for `category`
    ///
    /// The label mapping and the message's applied labels are fetched fresh
    /// on every call. Remote failures are logged and returned.
    pub async fn reconcile(&self, message_id: &str, category: &str) -> Result<ReconcileOutcome> {
        match self.try_reconcile(message_id, category).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                error!("Error applying label to message {}: {}", message_id, e);
                Err(e)
            }
        }
    }

    async fn try_reconcile(&self, message_id: &str, category: &str) -> Result<ReconcileOutcome> {
        let label_map = classification_label_map(self.client.list_labels().await?);
        let message = self.client.get_message(message_id).await?;

        let classification_ids: HashSet<&String> = label_map.values().collect();
        let to_remove: Vec<String> = message
            .label_ids
            .iter()
            .filter(|id| classification_ids.contains(id))
            .cloned()
            .collect();

        if !to_remove.is_empty() {
            debug!("Removing {} classification label(s) from {}", to_remove.len(), message_id);
            self.client.modify_labels(message_id, &[], &to_remove).await?;
        }

        let resolved = canonical_label(category)
            .and_then(|name| label_map.get(name).map(|id| (name, id)));

        let (name, id, outcome) = match resolved {
            Some((name, id)) => (name, id, ReconcileOutcome::Applied(name.to_string())),
            None => match label_map.get(FALLBACK_LABEL) {
                Some(id) => {
                    warn!(
                        "Label '{}' not found, using fallback label '{}' for message {}",
                        category, FALLBACK_LABEL, message_id
                    );
                    (
                        FALLBACK_LABEL,
                        id,
                        ReconcileOutcome::Fallback(FALLBACK_LABEL.to_string()),
                    )
                }
                None => {
                    error!(
                        "Neither '{}' nor fallback label '{}' exists; message {} left unlabeled",
                        category, FALLBACK_LABEL, message_id
                    );
                    return Ok(ReconcileOutcome::Unlabeled);
                }
            },
        };

        self.client
            .modify_labels(message_id, std::slice::from_ref(id), &[])
            .await?;
        info!("Applied label {} to message {}", name, message_id);

        Ok(outcome)
    }
}
