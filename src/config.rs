use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::constants;
use crate::api::resilience::RetryConfig;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CredentialsConfig {
    /// Inline credentials JSON
    #[serde(default)]
    pub json: Option<String>,
    /// Path to a credentials JSON file
    #[serde(default)]
    pub file: Option<PathBuf>,
    /// Static bearer token
    #[serde(default)]
    pub access_token: Option<String>,
    /// Subject for domain-wide delegation
    #[serde(default)]
    pub impersonate_user: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_max_retries() -> u32 {
    5
}

fn default_initial_backoff_ms() -> u64 {
    1000
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl RetrySettings {
    pub fn to_retry_config(&self) -> RetryConfig {
        RetryConfig::builder()
            .max_retries(self.max_retries)
            .initial_backoff(Duration::from_millis(self.initial_backoff_ms))
            .max_backoff(Duration::from_millis(self.max_backoff_ms))
            .build()
            .with_env_overrides()
    }
}

/// Upstream hosts; overridden in tests to point at local fakes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoints {
    #[serde(default = "default_forms_url")]
    pub forms: String,
    #[serde(default = "default_drive_url")]
    pub drive: String,
    #[serde(default = "default_sheets_url")]
    pub sheets: String,
}

fn default_forms_url() -> String {
    constants::FORMS_BASE_URL.to_string()
}

fn default_drive_url() -> String {
    constants::DRIVE_BASE_URL.to_string()
}

fn default_sheets_url() -> String {
    constants::SHEETS_BASE_URL.to_string()
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            forms: default_forms_url(),
            drive: default_drive_url(),
            sheets: default_sheets_url(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Behavior {
    /// Skip navigation targets whose section key cannot be resolved
    #[serde(default)]
    pub allow_missing_navigation: bool,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_request_logging")]
    pub request_logging: bool,
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_request_logging() -> bool {
    true
}

impl Default for Behavior {
    fn default() -> Self {
        Self {
            allow_missing_navigation: false,
            request_timeout_secs: default_request_timeout_secs(),
            request_logging: default_request_logging(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub endpoints: Endpoints,
    #[serde(default)]
    pub behavior: Behavior,
}

impl Config {
    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("gforms");
        Ok(config_dir.join("config.toml"))
    }

    /// Load from `path`, or from the default location when `None`.
    /// A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::get_config_path()?,
        };
        debug!("Loading config from: {:?}", config_path);

        if !config_path.exists() {
            if path.is_some() {
                anyhow::bail!("Config file not found: {:?}", config_path);
            }
            info!("Config file doesn't exist, using defaults");
            return Ok(Self::default());
        }

        let config_content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        Self::from_toml(&config_content)
            .with_context(|| format!("Failed to parse config file: {:?}", config_path))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        if config.retry.initial_backoff_ms > config.retry.max_backoff_ms {
            anyhow::bail!(
                "retry.initial_backoff_ms ({}) exceeds retry.max_backoff_ms ({})",
                config.retry.initial_backoff_ms,
                config.retry.max_backoff_ms
            );
        }
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        debug!("Saving config to: {:?}", path);

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
            }
        }

        let config_content =
            toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(path, config_content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.behavior.request_timeout_secs)
    }
}
