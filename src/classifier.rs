//! Email classification through a remote chat-completion service
//!
//! [`EmailClassifier`] renders the prompt template for one message, sends it
//! to a [`ClassificationService`] and parses the JSON answer. Any failure is
//! folded into an `ERROR` result so a single bad message never stops a batch.

use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, ChatCompletionResponseFormat,
    ChatCompletionResponseFormatType, CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{Result, TriageError};
use crate::models::ClassificationResult;

/// System prompt sent with every classification request
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an email classifier that categorizes emails.";

/// Default chat model
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Remote text-classification call
#[async_trait]
pub trait ClassificationService: Send + Sync {
    /// Submit the prompts and return the raw JSON text of the answer
    async fn complete(&self, system_prompt: &str, prompt: &str) -> Result<String>;
}

/// OpenAI chat-completions backend requesting JSON-object responses
pub struct OpenAiService {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiService {
    /// Create a backend for `model`. `api_base` overrides the OpenAI endpoint
    /// (e.g. `https://api.openai.com/v1`).
    pub fn new(api_key: &str, model: impl Into<String>, api_base: Option<&str>) -> Self {
        let mut config = OpenAIConfig::new().with_api_key(api_key);
        if let Some(base) = api_base {
            config = config.with_api_base(base);
        }

        Self {
            client: Client::with_config(config),
            model: model.into(),
        }
    }
}

#[async_trait]
impl ClassificationService for OpenAiService {
    async fn complete(&self, system_prompt: &str, prompt: &str) -> Result<String> {
        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system_prompt)
                .build()?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(self.model.as_str())
            .response_format(ChatCompletionResponseFormat {
                r#type: ChatCompletionResponseFormatType::JsonObject,
            })
            .messages(messages)
            .build()?;

        debug!("Requesting classification from model {}", self.model);
        let response = self.client.chat().create(request).await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                TriageError::ClassificationError("Response contained no message content".to_string())
            })
    }
}

/// Message fields substituted into the prompt template
#[derive(Debug, Clone, Copy)]
pub struct PromptFields<'a> {
    pub sender: &'a str,
    pub subject: &'a str,
    pub content: &'a str,
    pub email_date: &'a str,
}

/// Prompt text with `{sender}`, `{subject}`, `{content}` and `{email_date}`
/// placeholders. `{{` and `}}` produce literal braces.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    text: String,
}

impl PromptTemplate {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Read the template file
    pub async fn load(path: &Path) -> Result<Self> {
        match tokio::fs::read_to_string(path).await {
            Ok(text) => Ok(Self::new(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(TriageError::PromptTemplateError(format!(
                    "{} not found. Please create it with your classification instructions.",
                    path.display()
                )))
            }
            Err(e) => Err(TriageError::PromptTemplateError(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    pub fn render(&self, fields: &PromptFields<'_>) -> Result<String> {
        let mut out = String::with_capacity(self.text.len() + fields.content.len());
        let mut chars = self.text.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    out.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    out.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(ch) => name.push(ch),
                            None => {
                                return Err(TriageError::PromptTemplateError(
                                    "Unmatched '{' in template".to_string(),
                                ))
                            }
                        }
                    }

                    let value = match name.as_str() {
                        "sender" => fields.sender,
                        "subject" => fields.subject,
                        "content" => fields.content,
                        "email_date" => fields.email_date,
                        other => {
                            return Err(TriageError::PromptTemplateError(format!(
                                "Unknown placeholder '{{{}}}'",
                                other
                            )))
                        }
                    };
                    out.push_str(value);
                }
                '}' => {
                    return Err(TriageError::PromptTemplateError(
                        "Single '}' encountered in template".to_string(),
                    ))
                }
                _ => out.push(c),
            }
        }

        Ok(out)
    }
}

/// Parse the service's JSON answer
pub fn parse_classification(raw: &str) -> Result<ClassificationResult> {
    let mut result: ClassificationResult = serde_json::from_str(raw.trim())?;
    result.classification = result.classification.trim().to_string();

    if result.classification.is_empty() {
        return Err(TriageError::ClassificationError(
            "Response has an empty classification".to_string(),
        ));
    }
    Ok(result)
}

/// Rough token count of a text, used for diagnostics only
pub fn estimate_tokens(text: &str) -> usize {
    text.len() / 4
}

/// Classifies messages using a prompt template and a classification service
pub struct EmailClassifier {
    service: Box<dyn ClassificationService>,
    prompt_path: PathBuf,
    system_prompt: String,
}

impl EmailClassifier {
    pub fn new(service: Box<dyn ClassificationService>, prompt_path: impl Into<PathBuf>) -> Self {
        Self {
            service,
            prompt_path: prompt_path.into(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    /// Classify one message. Failures come back as an `ERROR` result whose
    /// reason carries the failure text.
    pub async fn classify(
        &self,
        sender: &str,
        subject: &str,
        content: &str,
        email_date: &str,
    ) -> ClassificationResult {
        let fields = PromptFields {
            sender,
            subject,
            content,
            email_date,
        };

        match self.try_classify(&fields).await {
            Ok(result) => result,
            Err(e) => {
                warn!("Classification failed: {}", e);
                ClassificationResult::error(format!("Failed to classify: {}", e))
            }
        }
    }

    async fn try_classify(&self, fields: &PromptFields<'_>) -> Result<ClassificationResult> {
        // Reloaded on every call so edits apply without a restart
        let template = PromptTemplate::load(&self.prompt_path).await?;
        let prompt = template.render(fields)?;

        let raw = self.service.complete(&self.system_prompt, &prompt).await?;
        parse_classification(&raw)
    }
}
