//! Inbox Triage
//!
//! Classifies recent Gmail messages with an OpenAI chat model and files each
//! one under exactly one of a fixed set of labels.
//!
//! # Overview
//!
//! - **Authentication**: OAuth2 installed-app flow with an on-disk token cache
//! - **Cleaning**: HTML and quoted-reply markup reduced to plain text
//! - **Classification**: prompt template + JSON-mode chat completion
//! - **Label reconciliation**: ATTN, FK-U, MARKETING, TAKE-A-LOOK and HMMMM
//!   are mutually exclusive; HMMMM is the fallback
//! - **Batch driver**: paged listing, skip of already-labeled messages, pacing
//!
//! # Example Usage
//!
//! ```no_run
//! use inbox_triage::classifier::{EmailClassifier, OpenAiService};
//! use inbox_triage::client::ProductionGmailClient;
//! use inbox_triage::config::{Config, Secrets};
//! use inbox_triage::scanner::{BatchDriver, ScanMode, ScanSettings};
//! use inbox_triage::auth;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml".as_ref()).await?;
//!     let secrets = Secrets::load(&config.classification.secrets_file).await?;
//!
//!     let hub = auth::initialize_gmail_hub(
//!         "credentials.json".as_ref(),
//!         ".inbox-triage/token.json".as_ref(),
//!     )
//!     .await?;
//!     let client = ProductionGmailClient::new(hub, config.scan.page_size);
//!
//!     let service = OpenAiService::new(&secrets.openai_api_key, "gpt-3.5-turbo", None);
//!     let classifier = EmailClassifier::new(Box::new(service), "prompt.txt");
//!
//!     let driver = BatchDriver::new(&client, &classifier, ScanSettings::from(&config.scan));
//!     let report = driver.run(&ScanMode::RecentInbox { lookback_days: 14 }).await?;
//!     println!("Labeled {} messages", report.labeled);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Module Organization
//!
//! - [`auth`] - OAuth2 authentication and Gmail API initialization
//! - [`client`] - Gmail API client trait and production implementation
//! - [`cleaner`] - Message body cleanup
//! - [`classifier`] - Prompt rendering and the classification service
//! - [`cli`] - Command-line interface and run orchestration
//! - [`config`] - Configuration and secrets
//! - [`error`] - Error types and result aliases
//! - [`label_manager`] - Label creation and exclusive reconciliation
//! - [`models`] - Core data structures and the label vocabulary
//! - [`scanner`] - Batch driver

pub mod auth;
pub mod classifier;
pub mod cleaner;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod label_manager;
pub mod models;
pub mod scanner;

// Re-export commonly used types for convenience
pub use error::{Result, TriageError};

pub use models::{ClassificationResult, EmailMessage, CLASSIFICATION_LABELS, FALLBACK_LABEL};

pub use cleaner::clean_email_content;

pub use classifier::{ClassificationService, EmailClassifier, OpenAiService, PromptTemplate};

pub use config::{ClassificationConfig, Config, ScanConfig, Secrets};

pub use client::{GmailClient, LabelInfo, MessagePage, ProductionGmailClient};

pub use label_manager::{LabelManager, ReconcileOutcome};

pub use scanner::{BatchDriver, BatchReport, MessageOutcome, ScanMode, ScanSettings};

pub use cli::{Cli, Commands, ProgressReporter};
