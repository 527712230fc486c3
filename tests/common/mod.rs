//! Common test utilities and fixtures

#![allow(dead_code)]

use inbox_triage::classifier::{ClassificationService, EmailClassifier};
use inbox_triage::client::{GmailClient, LabelInfo, MessagePage};
use inbox_triage::error::{Result, TriageError};
use inbox_triage::models::EmailMessage;
use inbox_triage::scanner::ScanSettings;
use mockall::mock;
use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;
use tempfile::NamedTempFile;

pub const PROMPT_TEMPLATE: &str = "Classify this email as ATTN, FK-U, MARKETING, TAKE-A-LOOK or HMMMM.\n\
From: {sender}\nSubject: {subject}\nDate: {email_date}\n\n{content}\n\n\
Answer with JSON: {{\"classification\": \"...\", \"reason\": \"...\"}}";

/// Create a test message with default values
pub fn create_test_message(id: &str, sender: &str, subject: &str) -> EmailMessage {
    EmailMessage {
        id: id.to_string(),
        sender: sender.to_string(),
        subject: subject.to_string(),
        date: "Mon, 1 Jan 2024 10:00:00 -0800".to_string(),
        body: Some("<p>Hello there</p>".to_string()),
        label_ids: vec!["INBOX".to_string(), "UNREAD".to_string()],
    }
}

/// Create a test LabelInfo
pub fn create_test_label_info(id: &str, name: &str) -> LabelInfo {
    LabelInfo {
        id: id.to_string(),
        name: name.to_string(),
    }
}

/// All five classification labels with ids Label_1..Label_5
pub fn classification_label_infos() -> Vec<LabelInfo> {
    inbox_triage::CLASSIFICATION_LABELS
        .iter()
        .enumerate()
        .map(|(i, name)| create_test_label_info(&format!("Label_{}", i + 1), name))
        .collect()
}

/// Write the prompt template to a temp file
pub fn prompt_file() -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create prompt file");
    file.write_all(PROMPT_TEMPLATE.as_bytes())
        .expect("write prompt file");
    file
}

/// Classifier over `service` with a temp prompt file that lives as long as
/// the returned guard
pub fn classifier_with(service: impl ClassificationService + 'static) -> (EmailClassifier, NamedTempFile) {
    let prompt = prompt_file();
    let classifier = EmailClassifier::new(Box::new(service), prompt.path());
    (classifier, prompt)
}

/// Classification JSON answer as the service would return it
pub fn classification_json(category: &str, reason: &str) -> String {
    serde_json::json!({ "classification": category, "reason": reason }).to_string()
}

/// Driver settings without any pauses
pub fn fast_settings() -> ScanSettings {
    ScanSettings {
        page_delay: Duration::ZERO,
        pacing_interval: 5,
        pacing_delay: Duration::ZERO,
    }
}

// Mock implementation of GmailClient for testing
mock! {
    pub GmailClient {}

    #[async_trait::async_trait]
    impl GmailClient for GmailClient {
        async fn list_message_page(&self, query: &str, page_token: Option<String>) -> Result<MessagePage>;
        async fn get_message(&self, id: &str) -> Result<EmailMessage>;
        async fn list_labels(&self) -> Result<Vec<LabelInfo>>;
        async fn create_label(&self, name: &str) -> Result<String>;
        async fn modify_labels(
            &self,
            message_id: &str,
            add_label_ids: &[String],
            remove_label_ids: &[String],
        ) -> Result<()>;
    }
}

// Mock implementation of ClassificationService for testing
mock! {
    pub ClassificationService {}

    #[async_trait::async_trait]
    impl ClassificationService for ClassificationService {
        async fn complete(&self, system_prompt: &str, prompt: &str) -> Result<String>;
    }
}

#[derive(Default)]
struct MailboxState {
    labels: Vec<LabelInfo>,
    messages: Vec<EmailMessage>,
    page_size: usize,
    queries: Vec<(String, Option<String>)>,
    created_labels: Vec<String>,
    modify_calls: Vec<(String, Vec<String>, Vec<String>)>,
    fail_modify: bool,
}

/// In-memory mailbox that keeps label state across calls
pub struct FakeMailbox {
    state: Mutex<MailboxState>,
}

impl FakeMailbox {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MailboxState {
                page_size: 100,
                ..Default::default()
            }),
        }
    }

    /// Mailbox that already has every classification label
    pub fn with_classification_labels() -> Self {
        let mailbox = Self::new();
        mailbox.state.lock().unwrap().labels = classification_label_infos();
        mailbox
    }

    pub fn add_label(&self, id: &str, name: &str) {
        self.state
            .lock()
            .unwrap()
            .labels
            .push(create_test_label_info(id, name));
    }

    pub fn add_message(&self, message: EmailMessage) {
        self.state.lock().unwrap().messages.push(message);
    }

    pub fn set_page_size(&self, page_size: usize) {
        self.state.lock().unwrap().page_size = page_size;
    }

    pub fn fail_modifications(&self) {
        self.state.lock().unwrap().fail_modify = true;
    }

    pub fn label_id(&self, name: &str) -> String {
        self.state
            .lock()
            .unwrap()
            .labels
            .iter()
            .find(|label| label.name == name)
            .map(|label| label.id.clone())
            .unwrap_or_else(|| panic!("no label named {}", name))
    }

    pub fn label_names(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .labels
            .iter()
            .map(|label| label.name.clone())
            .collect()
    }

    pub fn message_label_ids(&self, message_id: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .messages
            .iter()
            .find(|msg| msg.id == message_id)
            .map(|msg| msg.label_ids.clone())
            .unwrap_or_default()
    }

    /// Classification label names currently applied to a message
    pub fn classification_labels_on(&self, message_id: &str) -> Vec<String> {
        let state = self.state.lock().unwrap();
        let applied = state
            .messages
            .iter()
            .find(|msg| msg.id == message_id)
            .map(|msg| msg.label_ids.clone())
            .unwrap_or_default();

        state
            .labels
            .iter()
            .filter(|label| inbox_triage::models::is_classification_label(&label.name))
            .filter(|label| applied.contains(&label.id))
            .map(|label| label.name.clone())
            .collect()
    }

    pub fn modify_calls(&self) -> Vec<(String, Vec<String>, Vec<String>)> {
        self.state.lock().unwrap().modify_calls.clone()
    }

    pub fn modify_calls_for(&self, message_id: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .modify_calls
            .iter()
            .filter(|(id, _, _)| id == message_id)
            .count()
    }

    pub fn queries(&self) -> Vec<(String, Option<String>)> {
        self.state.lock().unwrap().queries.clone()
    }

    pub fn created_labels(&self) -> Vec<String> {
        self.state.lock().unwrap().created_labels.clone()
    }
}

#[async_trait::async_trait]
impl GmailClient for FakeMailbox {
    async fn list_message_page(
        &self,
        query: &str,
        page_token: Option<String>,
    ) -> Result<MessagePage> {
        let mut state = self.state.lock().unwrap();
        state.queries.push((query.to_string(), page_token.clone()));

        let start: usize = page_token.as_deref().map_or(0, |t| t.parse().unwrap());
        let end = (start + state.page_size).min(state.messages.len());
        let message_ids = state.messages[start..end]
            .iter()
            .map(|msg| msg.id.clone())
            .collect();
        let next_page_token = (end < state.messages.len()).then(|| end.to_string());

        Ok(MessagePage {
            message_ids,
            next_page_token,
        })
    }

    async fn get_message(&self, id: &str) -> Result<EmailMessage> {
        self.state
            .lock()
            .unwrap()
            .messages
            .iter()
            .find(|msg| msg.id == id)
            .cloned()
            .ok_or_else(|| TriageError::MessageNotFound(id.to_string()))
    }

    async fn list_labels(&self) -> Result<Vec<LabelInfo>> {
        Ok(self.state.lock().unwrap().labels.clone())
    }

    async fn create_label(&self, name: &str) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        let id = format!("Label_new_{}", state.labels.len() + 1);
        state.labels.push(create_test_label_info(&id, name));
        state.created_labels.push(name.to_string());
        Ok(id)
    }

    async fn modify_labels(
        &self,
        message_id: &str,
        add_label_ids: &[String],
        remove_label_ids: &[String],
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_modify {
            return Err(TriageError::ServerError {
                status: 500,
                message: "backend error".to_string(),
            });
        }

        state.modify_calls.push((
            message_id.to_string(),
            add_label_ids.to_vec(),
            remove_label_ids.to_vec(),
        ));

        let message = state
            .messages
            .iter_mut()
            .find(|msg| msg.id == message_id)
            .ok_or_else(|| TriageError::MessageNotFound(message_id.to_string()))?;

        message.label_ids.retain(|id| !remove_label_ids.contains(id));
        for id in add_label_ids {
            if !message.label_ids.contains(id) {
                message.label_ids.push(id.clone());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_test_message() {
        let msg = create_test_message("msg1", "test@example.com", "Test Subject");
        assert_eq!(msg.id, "msg1");
        assert_eq!(msg.sender, "test@example.com");
        assert_eq!(msg.subject, "Test Subject");
    }

    #[test]
    fn test_classification_label_infos() {
        let labels = classification_label_infos();
        assert_eq!(labels.len(), 5);
        assert_eq!(labels[0].id, "Label_1");
        assert_eq!(labels[4].name, "HMMMM");
    }

    #[tokio::test]
    async fn test_fake_mailbox_pages() {
        let mailbox = FakeMailbox::new();
        mailbox.set_page_size(2);
        for i in 0..3 {
            mailbox.add_message(create_test_message(&format!("m{}", i), "a@b.c", "s"));
        }

        let first = mailbox.list_message_page("q", None).await.unwrap();
        assert_eq!(first.message_ids, vec!["m0", "m1"]);
        assert_eq!(first.next_page_token.as_deref(), Some("2"));

        let second = mailbox
            .list_message_page("q", first.next_page_token)
            .await
            .unwrap();
        assert_eq!(second.message_ids, vec!["m2"]);
        assert!(second.next_page_token.is_none());
    }
}
