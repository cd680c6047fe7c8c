//! notesync configuration file handling
//!
//! Loads and manages the ~/.config/notesync/config.yaml file.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Which account to sync and where its token comes from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Account name, e.g. "someone@gmail.com"
    pub name: String,

    /// Environment variable holding the auth token
    #[serde(default = "default_token_env")]
    pub token_env: String,
}

fn default_token_env() -> String {
    "NOTESYNC_TOKEN".to_string()
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            token_env: default_token_env(),
        }
    }
}

/// Remote task service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Service base URL, without the trailing `/ig`
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// How long a login stays valid before the client logs in again
    #[serde(default = "default_login_ttl")]
    pub login_ttl_secs: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://mail.google.com/tasks".to_string()
}

fn default_login_ttl() -> u64 {
    300
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_request_timeout() -> u64 {
    15
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            login_ttl_secs: default_login_ttl(),
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl RemoteConfig {
    pub fn login_ttl(&self) -> Duration {
        Duration::from_secs(self.login_ttl_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Local note store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path of the SQLite note database
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

fn default_store_path() -> PathBuf {
    // Always use ~/.config for consistency across platforms (macOS, Linux)
    let mut path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push(".config");
    path.push("notesync");
    path.push("notes.db");
    path
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

/// Driver-side retry settings for failed runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
}

fn default_max_retries() -> u32 {
    2
}

fn default_initial_backoff_ms() -> u64 {
    2000
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
        }
    }
}

/// notesync configuration
///
/// Represents the complete ~/.config/notesync/config.yaml file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub account: AccountConfig,

    #[serde(default)]
    pub remote: RemoteConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub retry: RetrySettings,
}

impl SyncConfig {
    /// Create a configuration for one account with default settings
    pub fn new(account: impl Into<String>) -> Self {
        Self {
            account: AccountConfig {
                name: account.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Load configuration from the default path (~/.config/notesync/config.yaml)
    pub fn load_default() -> Result<Self> {
        let path = Self::default_path();
        Self::load(&path)
    }

    /// Load configuration from a specific path
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(crate::NoteSyncError::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        tracing::info!(path = %path.display(), "Loading notesync configuration");

        let content = fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;

        tracing::debug!(
            account = %config.account.name,
            store = %config.store.path.display(),
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    /// Save configuration to a specific path
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        tracing::info!(path = %path.display(), "Saving notesync configuration");

        let yaml = serde_yaml::to_string(self)?;
        fs::write(path, yaml)?;

        Ok(())
    }

    /// Get the default config path (~/.config/notesync/config.yaml)
    pub fn default_path() -> PathBuf {
        let mut path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(".config");
        path.push("notesync");
        path.push("config.yaml");
        path
    }

    /// Check the configuration, collapsing all problems into one error
    pub fn validate(&self) -> Result<()> {
        super::validation::validate_config_result(self)
    }
}
