use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{FilterFoxError, Result};
use crate::models::RunMode;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub gmail: GmailConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub history: HistoryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GmailConfig {
    #[serde(default = "default_credentials_path")]
    pub credentials_path: PathBuf,
    #[serde(default = "default_token_path")]
    pub token_path: PathBuf,
}

impl Default for GmailConfig {
    fn default() -> Self {
        Self {
            credentials_path: default_credentials_path(),
            token_path: default_token_path(),
        }
    }
}

/// Inputs for one pipeline pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Gmail search query selecting candidate messages
    #[serde(default = "default_query")]
    pub query: String,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_label_prefix")]
    pub label_prefix: String,
    /// Preview mode: classify and plan, but never modify messages.
    /// The CLI sets this from the `preview`/`apply` subcommand.
    #[serde(default = "default_dry_run")]
    pub dry_run: bool,
    /// Trash is disabled in the current policy; must stay false
    #[serde(default)]
    pub allow_trash: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            query: default_query(),
            max_results: default_max_results(),
            label_prefix: default_label_prefix(),
            dry_run: default_dry_run(),
            allow_trash: false,
        }
    }
}

impl RunConfig {
    pub fn mode(&self) -> RunMode {
        if self.dry_run {
            RunMode::Preview
        } else {
            RunMode::Apply
        }
    }

    /// Apply command-line overrides. Blank strings fall back to the defaults.
    pub fn with_overrides(
        mut self,
        query: Option<&str>,
        max_results: Option<usize>,
        label_prefix: Option<&str>,
    ) -> Self {
        if let Some(query) = query {
            let query = query.trim();
            self.query = if query.is_empty() {
                default_query()
            } else {
                query.to_string()
            };
        }
        if let Some(max_results) = max_results {
            self.max_results = max_results;
        }
        if let Some(prefix) = label_prefix {
            let prefix = prefix.trim();
            self.label_prefix = if prefix.is_empty() {
                default_label_prefix()
            } else {
                prefix.to_string()
            };
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.query.trim().is_empty() {
            return Err(FilterFoxError::ConfigError(
                "run.query cannot be empty".to_string(),
            ));
        }
        if self.max_results == 0 {
            return Err(FilterFoxError::ConfigError(
                "run.max_results must be at least 1".to_string(),
            ));
        }
        if self.label_prefix.trim().is_empty() {
            return Err(FilterFoxError::ConfigError(
                "run.label_prefix cannot be empty".to_string(),
            ));
        }
        if self.allow_trash {
            return Err(FilterFoxError::ConfigError(
                "run.allow_trash is not supported; the trash action is disabled".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_history_path")]
    pub path: PathBuf,
    #[serde(default = "default_history_max_entries")]
    pub max_entries: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            path: default_history_path(),
            max_entries: default_history_max_entries(),
        }
    }
}

fn default_credentials_path() -> PathBuf {
    PathBuf::from("credentials.json")
}

fn default_token_path() -> PathBuf {
    PathBuf::from(".filterfox/token.json")
}

fn default_query() -> String {
    "newer_than:30d in:inbox".to_string()
}

fn default_max_results() -> usize {
    200
}

fn default_label_prefix() -> String {
    "FilterFox".to_string()
}

fn default_dry_run() -> bool {
    true
}

fn default_history_path() -> PathBuf {
    PathBuf::from(".filterfox/history.json")
}

fn default_history_max_entries() -> usize {
    50
}

impl Config {
    pub async fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            FilterFoxError::ConfigError(format!("Failed to read config file: {}", e))
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| {
            FilterFoxError::ConfigError(format!("Failed to parse config file: {}", e))
        })?;

        config.validate()?;

        tracing::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                FilterFoxError::ConfigError(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self).map_err(|e| {
            FilterFoxError::ConfigError(format!("Failed to serialize config: {}", e))
        })?;

        tokio::fs::write(path, content).await.map_err(|e| {
            FilterFoxError::ConfigError(format!("Failed to write config file: {}", e))
        })?;

        tracing::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        self.run.validate()?;

        if self.history.max_entries == 0 {
            return Err(FilterFoxError::ConfigError(
                "history.max_entries must be at least 1".to_string(),
            ));
        }

        tracing::debug!("Configuration validation passed");
        Ok(())
    }

    /// Create an example configuration file
    pub async fn create_example(path: &Path) -> Result<()> {
        Self::default().save(path).await
    }
}
