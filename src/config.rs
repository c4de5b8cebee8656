use crate::{error::Result, RevisionError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default)]
    pub demo_mode: bool,
    #[serde(default)]
    pub use_mock_data: bool,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_retry_max_attempts")]
    pub retry_max_attempts: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_actor")]
    pub actor: String,
    #[serde(default = "default_journal_enabled")]
    pub journal_enabled: bool,
    #[serde(default)]
    pub journal_path: Option<PathBuf>,
}

fn default_api_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

// 1 means a single attempt: fetch retries are opt-in
fn default_retry_max_attempts() -> u32 {
    1
}

fn default_retry_base_delay_ms() -> u64 {
    250
}

fn default_actor() -> String {
    "Current User".to_string()
}

fn default_journal_enabled() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_base_url: default_api_base_url(),
            demo_mode: false,
            use_mock_data: false,
            request_timeout_secs: default_request_timeout_secs(),
            retry_max_attempts: default_retry_max_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            actor: default_actor(),
            journal_enabled: default_journal_enabled(),
            journal_path: None,
        }
    }
}

impl Config {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Where the offline journal lives, if journaling is enabled.
    pub fn resolved_journal_path(&self) -> Result<Option<PathBuf>> {
        if !self.journal_enabled {
            return Ok(None);
        }
        if let Some(path) = &self.journal_path {
            return Ok(Some(path.clone()));
        }

        let mut path = dirs::data_dir()
            .ok_or_else(|| RevisionError::Config("Failed to get data directory".to_string()))?;
        path.push("redline");
        fs::create_dir_all(&path)?;
        path.push("revisions.db");
        Ok(Some(path))
    }
}

fn normalize_base_url(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return default_api_base_url();
    }
    trimmed.to_string()
}

pub fn get_config_path() -> Result<PathBuf> {
    let mut path = dirs::config_dir()
        .ok_or_else(|| RevisionError::Config("Failed to get config directory".to_string()))?;

    path.push("redline");
    fs::create_dir_all(&path)?;

    path.push("config.json");
    Ok(path)
}

pub fn load_config() -> Result<Config> {
    let config_path = get_config_path()?;
    load_config_from(&config_path)
}

/// Loads a config file, writing defaults if it does not exist yet.
///
/// Files written by older versions are backfilled with the new fields and saved again.
pub fn load_config_from(path: &Path) -> Result<Config> {
    if !path.exists() {
        let default_config = Config::default();
        save_config_to(path, &default_config)?;
        return Ok(default_config);
    }

    let content = fs::read_to_string(path)?;
    let value: serde_json::Value = serde_json::from_str(&content)
        .map_err(|e| RevisionError::Config(format!("Failed to parse config: {}", e)))?;
    let mut config: Config = serde_json::from_value(value.clone())
        .map_err(|e| RevisionError::Config(format!("Failed to parse config: {}", e)))?;

    let normalized_url = normalize_base_url(&config.api_base_url);
    let mut changed = false;
    if normalized_url != config.api_base_url {
        config.api_base_url = normalized_url;
        changed = true;
    }
    if config.retry_max_attempts == 0 {
        config.retry_max_attempts = 1;
        changed = true;
    }

    let needs_backfill = value
        .as_object()
        .map(|obj| !obj.contains_key("api_base_url") || !obj.contains_key("journal_enabled"))
        .unwrap_or(false);
    if needs_backfill || changed {
        save_config_to(path, &config)?;
    }

    Ok(config)
}

pub fn save_config_to(path: &Path, config: &Config) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let content = serde_json::to_string_pretty(config)
        .map_err(|e| RevisionError::Config(format!("Failed to serialize config: {}", e)))?;

    fs::write(path, content)?;

    Ok(())
}
