//! Gmail API client used by the triage pipeline

use async_trait::async_trait;
use google_gmail1::api::{Label, Message, MessagePart, MessagePartHeader, ModifyMessageRequest};
use std::time::Duration;
use tracing::{debug, warn};

use crate::auth::{GmailHub, CALL_SCOPE};
use crate::error::{Result, TriageError};
use crate::models::{EmailMessage, NO_DATE, NO_SENDER, NO_SUBJECT};

/// Label info returned from Gmail API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelInfo {
    pub id: String,
    pub name: String,
}

/// One page of a message listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessagePage {
    pub message_ids: Vec<String>,
    pub next_page_token: Option<String>,
}

/// Trait defining Gmail client operations for easier testing
#[async_trait]
pub trait GmailClient: Send + Sync {
    /// List one page of message IDs matching a query
    async fn list_message_page(&self, query: &str, page_token: Option<String>)
        -> Result<MessagePage>;

    /// Get a message with headers, primary body and current labels
    async fn get_message(&self, id: &str) -> Result<EmailMessage>;

    /// List all labels in the account
    async fn list_labels(&self) -> Result<Vec<LabelInfo>>;

    /// Create a new label, returning its ID
    async fn create_label(&self, name: &str) -> Result<String>;

    /// Add and remove labels on one message in a single call
    async fn modify_labels(
        &self,
        message_id: &str,
        add_label_ids: &[String],
        remove_label_ids: &[String],
    ) -> Result<()>;
}

/// Gmail client backed by the google-gmail1 hub
///
/// Calls are issued one at a time and never retried.
pub struct ProductionGmailClient {
    hub: GmailHub,
    page_size: u32,
}

impl ProductionGmailClient {
    /// # Arguments
    /// * `hub` - Gmail API hub instance
    /// * `page_size` - Messages requested per listing page
    pub fn new(hub: GmailHub, page_size: u32) -> Self {
        Self { hub, page_size }
    }
}

/// Case-insensitive header lookup
fn header_value<'a>(headers: &'a [MessagePartHeader], name: &str) -> Option<&'a str> {
    headers.iter().find_map(|header| match (&header.name, &header.value) {
        (Some(n), Some(v)) if n.eq_ignore_ascii_case(name) => Some(v.as_str()),
        _ => None,
    })
}

/// The first multipart segment if there is one, else the payload itself
fn primary_part(payload: &MessagePart) -> &MessagePart {
    payload
        .parts
        .as_ref()
        .and_then(|parts| parts.first())
        .unwrap_or(payload)
}

/// Parse a full-format Gmail API Message into our EmailMessage structure
pub fn parse_full_message(msg: Message) -> Result<EmailMessage> {
    let id = msg
        .id
        .ok_or_else(|| TriageError::InvalidMessageFormat("Missing message ID".to_string()))?;

    let label_ids = msg.label_ids.unwrap_or_default();
    let payload = msg.payload.unwrap_or_default();
    let headers = payload.headers.as_deref().unwrap_or(&[]);

    let subject = header_value(headers, "subject").unwrap_or(NO_SUBJECT).to_string();
    let sender = header_value(headers, "from").unwrap_or(NO_SENDER).to_string();
    let date = header_value(headers, "date").unwrap_or(NO_DATE).to_string();

    // google-gmail1 has already undone the url-safe base64 encoding
    let body = primary_part(&payload)
        .body
        .as_ref()
        .and_then(|body| body.data.as_deref())
        .filter(|data| !data.is_empty())
        .map(|data| match String::from_utf8(data.to_vec()) {
            Ok(text) => text,
            Err(e) => {
                warn!("Message {} body is not valid UTF-8, decoding lossily", id);
                String::from_utf8_lossy(e.as_bytes()).into_owned()
            }
        });

    Ok(EmailMessage {
        id,
        sender,
        subject,
        date,
        body,
        label_ids,
    })
}

#[async_trait]
impl GmailClient for ProductionGmailClient {
    async fn list_message_page(
        &self,
        query: &str,
        page_token: Option<String>,
    ) -> Result<MessagePage> {
        let mut call = self
            .hub
            .users()
            .messages_list("me")
            .q(query)
            .max_results(self.page_size);

        if let Some(token) = page_token.as_deref() {
            call = call.page_token(token);
        }

        let (_, response) = call.add_scope(CALL_SCOPE).doit().await?;

        let message_ids = response
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(|msg_ref| msg_ref.id)
            .collect();

        Ok(MessagePage {
            message_ids,
            next_page_token: response.next_page_token,
        })
    }

    async fn get_message(&self, id: &str) -> Result<EmailMessage> {
        let (_, msg) = self
            .hub
            .users()
            .messages_get("me", id)
            .format("full")
            .add_scope(CALL_SCOPE)
            .doit()
            .await?;

        parse_full_message(msg)
    }

    async fn list_labels(&self) -> Result<Vec<LabelInfo>> {
        // Wrap API call in timeout to prevent indefinite hangs
        let timeout_duration = Duration::from_secs(30);
        let api_call = async {
            debug!("Calling Gmail API to list labels...");
            self.hub
                .users()
                .labels_list("me")
                .add_scope(CALL_SCOPE)
                .doit()
                .await
        };

        let (_, response) = match tokio::time::timeout(timeout_duration, api_call).await {
            Ok(result) => result?,
            Err(_) => {
                warn!("Gmail API list_labels call timed out after {:?}", timeout_duration);
                return Err(TriageError::NetworkError(format!(
                    "API call timed out after {:?}",
                    timeout_duration
                )));
            }
        };

        let labels: Vec<LabelInfo> = response
            .labels
            .unwrap_or_default()
            .into_iter()
            .filter_map(|label| match (label.id, label.name) {
                (Some(id), Some(name)) => Some(LabelInfo { id, name }),
                _ => None,
            })
            .collect();

        debug!("Successfully parsed {} labels", labels.len());
        Ok(labels)
    }

    async fn create_label(&self, name: &str) -> Result<String> {
        let label = Label {
            name: Some(name.to_string()),
            message_list_visibility: Some("show".to_string()),
            label_list_visibility: Some("labelShow".to_string()),
            ..Default::default()
        };

        let (_, created_label) = self
            .hub
            .users()
            .labels_create(label, "me")
            .add_scope(CALL_SCOPE)
            .doit()
            .await?;

        created_label
            .id
            .ok_or_else(|| TriageError::LabelError("Created label has no ID".to_string()))
    }

    async fn modify_labels(
        &self,
        message_id: &str,
        add_label_ids: &[String],
        remove_label_ids: &[String],
    ) -> Result<()> {
        let to_option = |ids: &[String]| (!ids.is_empty()).then(|| ids.to_vec());
        let modify_request = ModifyMessageRequest {
            add_label_ids: to_option(add_label_ids),
            remove_label_ids: to_option(remove_label_ids),
        };

        self.hub
            .users()
            .messages_modify(modify_request, "me", message_id)
            .add_scope(CALL_SCOPE)
            .doit()
            .await?;

        Ok(())
    }
}
