use anyhow::Result;
use clap::Parser;
use inbox_triage::cli::{self, Cli, Commands};
use inbox_triage::config::Config;
use inbox_triage::error::TriageError;
use inbox_triage::scanner::BatchReport;
use indicatif::MultiProgress;
use std::io::Write;
use std::process;
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// A writer that prints through MultiProgress so log lines stay above the bars
#[derive(Clone)]
struct MultiProgressWriter {
    multi: MultiProgress,
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl MultiProgressWriter {
    fn new(multi: MultiProgress) -> Self {
        Self {
            multi,
            buffer: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl Write for MultiProgressWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut buffer = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
        buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let mut buffer = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
        if !buffer.is_empty() {
            let msg = String::from_utf8_lossy(&buffer);
            let msg = msg.trim_end_matches('\n');
            if !msg.is_empty() {
                let _ = self.multi.println(msg);
            }
            buffer.clear();
        }
        Ok(())
    }
}

impl Drop for MultiProgressWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

/// MakeWriter implementation for tracing
#[derive(Clone)]
struct MultiProgressMakeWriter {
    multi: MultiProgress,
}

impl<'a> MakeWriter<'a> for MultiProgressMakeWriter {
    type Writer = MultiProgressWriter;

    fn make_writer(&'a self) -> Self::Writer {
        MultiProgressWriter::new(self.multi.clone())
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        display_error(&e);
        eprintln!("\nFor help, run: inbox-triage --help");
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    // google-gmail1 and async-openai pull in different rustls crypto
    // providers, so one has to be installed explicitly
    #[cfg(not(windows))]
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install default crypto provider"))?;

    #[cfg(windows)]
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install default crypto provider"))?;

    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("inbox_triage=debug,warn"))
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("inbox_triage=info,warn"))
    };

    let multi_progress = MultiProgress::new();
    let make_writer = MultiProgressMakeWriter {
        multi: multi_progress.clone(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(make_writer)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    match cli.command {
        Commands::Auth { force } => {
            tracing::info!("Authenticating with Gmail API...");

            if let Some(parent) = cli.token_cache.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }

            if force && cli.token_cache.exists() {
                tokio::fs::remove_file(&cli.token_cache).await?;
                tracing::info!("Removed existing token cache");
            }

            let hub =
                inbox_triage::auth::initialize_gmail_hub(&cli.credentials, &cli.token_cache)
                    .await?;

            println!("Successfully authenticated with Gmail API");
            println!("Token cached at: {:?}", cli.token_cache);

            // Reuse the cached token's scope so no second consent flow starts
            let (_, profile) = hub
                .users()
                .get_profile("me")
                .add_scope(inbox_triage::auth::CALL_SCOPE)
                .doit()
                .await?;
            println!(
                "Connected to account: {}",
                profile.email_address.unwrap_or_default()
            );

            Ok(())
        }

        Commands::Scan => {
            if let Some(parent) = cli.token_cache.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let report = cli::run_triage(&cli, None, multi_progress).await?;
            print_summary(&report);
            Ok(())
        }

        Commands::Query { ref filter } => {
            if let Some(parent) = cli.token_cache.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let report = cli::run_triage(&cli, Some(filter.clone()), multi_progress).await?;
            print_summary(&report);
            Ok(())
        }

        Commands::InitConfig { output, force } => {
            tracing::info!("Generating example configuration file");

            if output.exists() && !force {
                return Err(TriageError::ConfigError(format!(
                    "Configuration file already exists at {:?}. Use --force to overwrite.",
                    output
                ))
                .into());
            }

            Config::create_example(&output).await?;

            println!("Created example configuration file at: {:?}", output);
            println!("\nKey settings to review:");
            println!("  - scan.lookback_days: How many days back the inbox scan reaches");
            println!("  - scan.pacing_interval / pacing_delay_ms: Pause cadence between messages");
            println!("  - classification.model: OpenAI chat model");
            println!("  - classification.prompt_file: Prompt template with {{sender}}, {{subject}}, {{content}}, {{email_date}}");

            Ok(())
        }
    }
}

fn print_summary(report: &BatchReport) {
    println!("\n========================================");
    println!("Triage Summary");
    println!("========================================");
    println!("Run ID: {}", report.run_id);
    println!("Query: {}", report.query);
    if let Some(duration) = report.duration() {
        println!("Duration: {} seconds", duration.num_seconds());
    }
    println!("Messages listed: {}", report.listed);
    println!("Already classified (skipped): {}", report.skipped);
    println!("Labeled: {}", report.labeled);
    println!("Fallback label applied: {}", report.fallback);
    println!("Left unlabeled: {}", report.unlabeled);
    println!("Classification errors: {}", report.classification_errors);
    if let Some(reason) = &report.aborted {
        println!(
            "Stopped early after {} of {} messages: {}",
            report.processed(),
            report.listed,
            reason
        );
    }
    println!("========================================");
}

/// Display error with context
fn display_error(error: &anyhow::Error) {
    eprintln!("Error: {}", error);

    for cause in error.chain().skip(1) {
        eprintln!("  Caused by: {}", cause);
    }

    if let Some(triage_err) = error.downcast_ref::<TriageError>() {
        match triage_err {
            TriageError::AuthError(_) => {
                eprintln!("\nHint: Make sure your credentials.json file is valid.");
                eprintln!("      You can download it from Google Cloud Console.");
                eprintln!("      Try running: inbox-triage auth --force");
            }
            TriageError::SecretsError(_) => {
                eprintln!("\nHint: Create secrets.json containing {{\"openai_api_key\": \"sk-...\"}}");
            }
            TriageError::PromptTemplateError(_) => {
                eprintln!("\nHint: Create the prompt file named in classification.prompt_file.");
            }
            TriageError::ConfigError(_) => {
                eprintln!("\nHint: Check your configuration file for errors.");
                eprintln!("      Run: inbox-triage init-config --force");
            }
            _ => {}
        }
    }
}
