//! Batch driver: list candidate messages and run clean -> classify -> label
//! over each of them in listing order

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use indicatif::ProgressBar;
use serde::Serialize;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, error, info, info_span, Instrument};
use uuid::Uuid;

use crate::classifier::{estimate_tokens, EmailClassifier};
use crate::cleaner::clean_email_content;
use crate::client::GmailClient;
use crate::config::ScanConfig;
use crate::error::Result;
use crate::label_manager::{LabelManager, ReconcileOutcome};
use crate::models::NO_CONTENT;

/// Characters of cleaned content shown in the per-message log
const PREVIEW_CHARS: usize = 300;

/// Which messages a run looks at
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanMode {
    /// Inbox messages outside spam newer than the look-back window
    RecentInbox { lookback_days: u32 },
    /// An arbitrary Gmail search filter, no date bound
    Query(String),
}

impl ScanMode {
    /// Gmail search query for this mode, relative to `now`
    pub fn query(&self, now: DateTime<Utc>) -> String {
        match self {
            ScanMode::RecentInbox { lookback_days } => {
                let date = now - ChronoDuration::days(i64::from(*lookback_days));
                format!("in:inbox -in:spam after:{}", date.format("%Y/%m/%d"))
            }
            ScanMode::Query(filter) => filter.clone(),
        }
    }
}

/// Pauses used to stay under the API rate limits
#[derive(Debug, Clone)]
pub struct ScanSettings {
    /// Pause before fetching each follow-up listing page
    pub page_delay: Duration,
    /// Pause every this many messages
    pub pacing_interval: usize,
    pub pacing_delay: Duration,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self::from(&ScanConfig::default())
    }
}

impl From<&ScanConfig> for ScanSettings {
    fn from(config: &ScanConfig) -> Self {
        Self {
            page_delay: config.page_delay(),
            pacing_interval: config.pacing_interval,
            pacing_delay: config.pacing_delay(),
        }
    }
}

/// Result of processing a single message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Already carried a classification label
    Skipped,
    /// The classifier returned `ERROR`; labels were left untouched
    ClassificationFailed(String),
    Reconciled {
        category: String,
        outcome: ReconcileOutcome,
    },
}

/// Summary of one batch run
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub run_id: Uuid,
    pub query: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub listed: usize,
    pub skipped: usize,
    pub classified: usize,
    pub labeled: usize,
    pub fallback: usize,
    pub unlabeled: usize,
    pub classification_errors: usize,
    /// Set when an error stopped the batch before every message was handled
    pub aborted: Option<String>,
}

impl BatchReport {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            query: query.into(),
            started_at: Utc::now(),
            completed_at: None,
            listed: 0,
            skipped: 0,
            classified: 0,
            labeled: 0,
            fallback: 0,
            unlabeled: 0,
            classification_errors: 0,
            aborted: None,
        }
    }

    pub fn record(&mut self, outcome: &MessageOutcome) {
        match outcome {
            MessageOutcome::Skipped => self.skipped += 1,
            MessageOutcome::ClassificationFailed(_) => self.classification_errors += 1,
            MessageOutcome::Reconciled { outcome, .. } => {
                self.classified += 1;
                match outcome {
                    ReconcileOutcome::Applied(_) => self.labeled += 1,
                    ReconcileOutcome::Fallback(_) => self.fallback += 1,
                    ReconcileOutcome::Unlabeled => self.unlabeled += 1,
                }
            }
        }
    }

    /// Messages that were handled before the run ended
    pub fn processed(&self) -> usize {
        self.skipped + self.classified + self.classification_errors
    }

    pub fn is_complete(&self) -> bool {
        self.aborted.is_none()
    }

    pub fn duration(&self) -> Option<ChronoDuration> {
        self.completed_at.map(|done| done - self.started_at)
    }
}

fn preview(content: &str) -> String {
    let mut chars = content.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

/// Drives one triage run over the messages a [`ScanMode`] selects
pub struct BatchDriver<'a> {
    client: &'a dyn GmailClient,
    classifier: &'a EmailClassifier,
    settings: ScanSettings,
    progress: ProgressBar,
}

impl<'a> BatchDriver<'a> {
    pub fn new(
        client: &'a dyn GmailClient,
        classifier: &'a EmailClassifier,
        settings: ScanSettings,
    ) -> Self {
        Self {
            client,
            classifier,
            settings,
            progress: ProgressBar::hidden(),
        }
    }

    /// Report per-message progress on `progress`
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Run a batch
    ///
    /// Fails only if the classification labels cannot be set up. Any later
    /// error stops the batch; it is logged and recorded in
    /// [`BatchReport::aborted`].
    pub async fn run(&self, mode: &ScanMode) -> Result<BatchReport> {
        let report = BatchReport::new(mode.query(Utc::now()));
        let span = info_span!("batch", run_id = %report.run_id);

        self.run_batch(report).instrument(span).await
    }

    async fn run_batch(&self, mut report: BatchReport) -> Result<BatchReport> {
        let labels = LabelManager::new(self.client);
        let classification_ids: HashSet<String> =
            labels.ensure_labels().await?.into_values().collect();

        if let Err(e) = self
            .process_all(&labels, &classification_ids, &mut report)
            .await
        {
            error!("An error occurred: {}", e);
            report.aborted = Some(e.to_string());
        }

        report.completed_at = Some(Utc::now());
        self.progress.finish_and_clear();
        info!(
            "Batch finished: {} listed, {} skipped, {} labeled, {} fallback, {} classification errors",
            report.listed,
            report.skipped,
            report.labeled,
            report.fallback,
            report.classification_errors
        );
        Ok(report)
    }

    async fn process_all(
        &self,
        labels: &LabelManager<'_>,
        classification_ids: &HashSet<String>,
        report: &mut BatchReport,
    ) -> Result<()> {
        info!("Searching for emails: {}", report.query);
        let message_ids = self.list_all(&report.query).await?;
        report.listed = message_ids.len();

        if message_ids.is_empty() {
            info!("No messages found.");
            return Ok(());
        }

        info!("Found {} messages to process", message_ids.len());
        self.progress.set_length(message_ids.len() as u64);

        for (index, message_id) in message_ids.iter().enumerate() {
            let interval = self.settings.pacing_interval;
            if index > 0 && interval > 0 && index % interval == 0 {
                debug!("Pausing for {:?} after {} messages", self.settings.pacing_delay, index);
                tokio::time::sleep(self.settings.pacing_delay).await;
            }

            let outcome = self
                .process_message(message_id, labels, classification_ids)
                .await?;
            report.record(&outcome);
            self.progress.inc(1);
        }

        Ok(())
    }

    /// Collect message ids from every listing page
    pub async fn list_all(&self, query: &str) -> Result<Vec<String>> {
        let mut message_ids = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = self.client.list_message_page(query, page_token.take()).await?;
            debug!("Listed page with {} message IDs", page.message_ids.len());
            message_ids.extend(page.message_ids);

            match page.next_page_token.filter(|token| !token.is_empty()) {
                Some(token) => {
                    tokio::time::sleep(self.settings.page_delay).await;
                    page_token = Some(token);
                }
                None => break,
            }
        }

        Ok(message_ids)
    }

    /// Clean, classify and label one message
    pub async fn process_message(
        &self,
        message_id: &str,
        labels: &LabelManager<'_>,
        classification_ids: &HashSet<String>,
    ) -> Result<MessageOutcome> {
        let message = self.client.get_message(message_id).await?;

        if message.has_any_label(classification_ids) {
            info!("Skipping message {}: already classified", message_id);
            return Ok(MessageOutcome::Skipped);
        }

        let content = match message.body.as_deref() {
            Some(body) => clean_email_content(body),
            None => NO_CONTENT.to_string(),
        };

        info!("Processing message {}", message_id);
        info!("From: {}", message.sender);
        info!("Subject: {}", message.subject);
        debug!("Content preview: {}", preview(&content));
        info!("Estimated token count: {}", estimate_tokens(&content));

        let result = self
            .classifier
            .classify(&message.sender, &message.subject, &content, &message.date)
            .await;
        info!("Classification: {}", result.classification);
        info!("Reason: {}", result.reason);

        if result.is_error() {
            return Ok(MessageOutcome::ClassificationFailed(result.reason));
        }

        let outcome = labels.reconcile(message_id, &result.classification).await?;
        Ok(MessageOutcome::Reconciled {
            category: result.classification,
            outcome,
        })
    }
}
