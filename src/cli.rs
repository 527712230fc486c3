//! Command-line interface

use clap::{Parser, Subcommand};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use crate::auth;
use crate::classifier::{EmailClassifier, OpenAiService, PromptTemplate};
use crate::client::ProductionGmailClient;
use crate::config::{Config, Secrets};
use crate::error::Result;
use crate::scanner::{BatchDriver, BatchReport, ScanMode, ScanSettings};

#[derive(Parser, Debug)]
#[command(name = "inbox-triage")]
#[command(version = "0.1.0")]
#[command(about = "Classify recent Gmail messages with OpenAI and label them", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Path to OAuth2 credentials file
    #[arg(long, default_value = "credentials.json")]
    pub credentials: PathBuf,

    /// Path to token cache file
    #[arg(long, default_value = ".inbox-triage/token.json")]
    pub token_cache: PathBuf,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Authenticate with Gmail API
    Auth {
        /// Force re-authentication even if token exists
        #[arg(long)]
        force: bool,
    },

    /// Classify inbox messages from the look-back window
    Scan,

    /// Classify messages matching a Gmail search filter
    Query {
        /// Gmail search filter, e.g. "from:someone@example.com"
        filter: String,
    },

    /// Generate example configuration file
    InitConfig {
        /// Path to create config file
        #[arg(short, long, default_value = "config.toml")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
}

/// Progress reporter using indicatif
pub struct ProgressReporter {
    multi: MultiProgress,
    spinner_style: ProgressStyle,
    bar_style: ProgressStyle,
}

impl ProgressReporter {
    /// Draw on `multi`, which is shared with the log writer
    pub fn new(multi: MultiProgress) -> Self {
        let spinner_style = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed:>6}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ");

        let bar_style = ProgressStyle::default_bar()
            .template("[{elapsed:>6}] {bar:40.cyan/blue} {pos:>7}/{len:7} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-");

        Self {
            multi,
            spinner_style,
            bar_style,
        }
    }

    pub fn add_spinner(&self, msg: &str) -> ProgressBar {
        let pb = self.multi.add(ProgressBar::new_spinner());
        pb.set_style(self.spinner_style.clone());
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }

    /// Bar whose length is set once the candidate messages are listed
    pub fn add_progress_bar(&self, msg: &str) -> ProgressBar {
        let pb = self.multi.add(ProgressBar::new(0));
        pb.set_style(self.bar_style.clone());
        pb.set_message(msg.to_string());
        pb
    }

    /// Finish a spinner and clear it from the multi-progress display
    pub fn finish_spinner(&self, pb: &ProgressBar, msg: &str) {
        pb.finish_and_clear();
        let _ = self.multi.println(format!("  ✓ {}", msg));
    }
}

/// Run one triage batch
///
/// Startup is fatal on an invalid config, missing or malformed secrets, a
/// missing prompt template, or failed authentication. Everything after that
/// is reported through the returned [`BatchReport`].
///
/// # Arguments
/// * `cli` - CLI arguments containing configuration paths
/// * `filter` - Gmail search filter; `None` scans the recent inbox
/// * `multi` - Progress display shared with the log writer
pub async fn run_triage(
    cli: &Cli,
    filter: Option<String>,
    multi: MultiProgress,
) -> Result<BatchReport> {
    let reporter = ProgressReporter::new(multi);

    let config_spinner = reporter.add_spinner("Loading configuration...");
    let config = Config::load(&cli.config).await?;
    let secrets = Secrets::load(&config.classification.secrets_file).await?;
    PromptTemplate::load(&config.classification.prompt_file).await?;
    reporter.finish_spinner(
        &config_spinner,
        &format!("Configuration loaded from {:?}", cli.config),
    );

    let auth_spinner = reporter.add_spinner("Authenticating with Gmail API...");
    let hub = auth::initialize_gmail_hub(&cli.credentials, &cli.token_cache).await?;
    reporter.finish_spinner(&auth_spinner, "Gmail API authenticated successfully");

    let client = ProductionGmailClient::new(hub, config.scan.page_size);

    let service = OpenAiService::new(
        &secrets.openai_api_key,
        config.classification.model.as_str(),
        config.classification.api_base.as_deref(),
    );
    let classifier = EmailClassifier::new(Box::new(service), &config.classification.prompt_file)
        .with_system_prompt(config.classification.system_prompt.as_str());

    let mode = match filter {
        Some(filter) => ScanMode::Query(filter),
        None => ScanMode::RecentInbox {
            lookback_days: config.scan.lookback_days,
        },
    };
    info!("Starting triage run: {:?}", mode);

    let progress = reporter.add_progress_bar("Classifying emails...");
    let driver = BatchDriver::new(&client, &classifier, ScanSettings::from(&config.scan))
        .with_progress(progress);

    driver.run(&mode).await
}
