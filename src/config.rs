use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::classifier::{DEFAULT_MODEL, DEFAULT_SYSTEM_PROMPT};
use crate::error::{Result, TriageError};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub classification: ClassificationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Look-back window of the recent-inbox scan
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Pause before fetching each follow-up listing page
    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,
    /// Pause after this many messages
    #[serde(default = "default_pacing_interval")]
    pub pacing_interval: usize,
    #[serde(default = "default_pacing_delay_ms")]
    pub pacing_delay_ms: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            lookback_days: default_lookback_days(),
            page_size: default_page_size(),
            page_delay_ms: default_page_delay_ms(),
            pacing_interval: default_pacing_interval(),
            pacing_delay_ms: default_pacing_delay_ms(),
        }
    }
}

impl ScanConfig {
    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }

    pub fn pacing_delay(&self) -> Duration {
        Duration::from_millis(self.pacing_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_prompt_file")]
    pub prompt_file: PathBuf,
    #[serde(default = "default_secrets_file")]
    pub secrets_file: PathBuf,
    /// Alternative OpenAI-compatible endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            prompt_file: default_prompt_file(),
            secrets_file: default_secrets_file(),
            api_base: None,
            system_prompt: default_system_prompt(),
        }
    }
}

fn default_lookback_days() -> u32 {
    14
}

fn default_page_size() -> u32 {
    100
}

fn default_page_delay_ms() -> u64 {
    2000
}

fn default_pacing_interval() -> usize {
    5
}

fn default_pacing_delay_ms() -> u64 {
    3000
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_prompt_file() -> PathBuf {
    PathBuf::from("prompt.txt")
}

fn default_secrets_file() -> PathBuf {
    PathBuf::from("secrets.json")
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

impl Config {
    pub async fn load(path: &Path) -> Result<Self> {
        // If file doesn't exist, return default config with warning
        if !path.exists() {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| TriageError::ConfigError(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| TriageError::ConfigError(format!("Failed to parse config file: {}", e)))?;

        config.validate()?;

        tracing::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                TriageError::ConfigError(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| TriageError::ConfigError(format!("Failed to serialize config: {}", e)))?;

        tokio::fs::write(path, content)
            .await
            .map_err(|e| TriageError::ConfigError(format!("Failed to write config file: {}", e)))?;

        tracing::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.scan.lookback_days == 0 {
            return Err(TriageError::ConfigError(
                "scan.lookback_days must be at least 1".to_string(),
            ));
        }
        if self.scan.lookback_days > 365 {
            return Err(TriageError::ConfigError(
                "scan.lookback_days cannot exceed 365 (1 year)".to_string(),
            ));
        }

        // Gmail caps messages.list at 500 results per page
        if self.scan.page_size == 0 || self.scan.page_size > 500 {
            return Err(TriageError::ConfigError(
                "scan.page_size must be between 1 and 500".to_string(),
            ));
        }

        if self.scan.pacing_interval == 0 {
            return Err(TriageError::ConfigError(
                "scan.pacing_interval must be at least 1".to_string(),
            ));
        }

        if self.classification.model.trim().is_empty() {
            return Err(TriageError::ConfigError(
                "classification.model cannot be empty".to_string(),
            ));
        }

        if self.classification.system_prompt.trim().is_empty() {
            return Err(TriageError::ConfigError(
                "classification.system_prompt cannot be empty".to_string(),
            ));
        }

        if let Some(base) = &self.classification.api_base {
            if !base.starts_with("http://") && !base.starts_with("https://") {
                return Err(TriageError::ConfigError(format!(
                    "classification.api_base must be an http(s) URL, got '{}'",
                    base
                )));
            }
        }

        tracing::debug!("Configuration validation passed");
        Ok(())
    }

    /// Create an example configuration file
    pub async fn create_example(path: &Path) -> Result<()> {
        Self::default().save(path).await
    }
}

/// API secrets read from the secrets file
#[derive(Clone, Deserialize)]
pub struct Secrets {
    pub openai_api_key: String,
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secrets")
            .field("openai_api_key", &"<redacted>")
            .finish()
    }
}

impl Secrets {
    /// Load secrets; a missing or malformed file is an error
    pub async fn load(path: &Path) -> Result<Self> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TriageError::SecretsError(format!(
                    "{} not found. Please create it with your OpenAI API key.",
                    path.display()
                )))
            }
            Err(e) => return Err(e.into()),
        };

        let secrets: Self = serde_json::from_str(&content).map_err(|e| {
            TriageError::SecretsError(format!(
                "{} is not properly formatted JSON: {}",
                path.display(),
                e
            ))
        })?;

        if secrets.openai_api_key.trim().is_empty() {
            return Err(TriageError::SecretsError(format!(
                "{} has an empty openai_api_key",
                path.display()
            )));
        }

        Ok(secrets)
    }
}
