//! Configuration validation
//!
//! Validates notesync configuration before a sync is attempted:
//! - An account is named and looks like an email address
//! - The remote base URL is http(s)
//! - Timeouts and the login TTL are non-zero
//! - The token environment variable is set (warning only)

use super::sync_config::SyncConfig;
use crate::NoteSyncError;

/// Validation error details
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validation result
pub type ValidationResult = std::result::Result<(), Vec<ValidationError>>;

/// Validate a notesync configuration
pub fn validate_config(config: &SyncConfig) -> ValidationResult {
    let mut errors = Vec::new();

    let account = config.account.name.trim();
    if account.is_empty() {
        errors.push(ValidationError::new(
            "account.name",
            "An account name is required",
        ));
    } else if !account.contains('@') {
        errors.push(ValidationError::new(
            "account.name",
            format!("Account '{}' is not an email address", account),
        ));
    }

    if config.account.token_env.is_empty() {
        errors.push(ValidationError::new(
            "account.token_env",
            "Token environment variable name cannot be empty",
        ));
    } else if std::env::var(&config.account.token_env).is_err() {
        tracing::warn!(
            env_var = %config.account.token_env,
            "Token environment variable not set (this may be intentional if set at runtime)"
        );
    }

    let base = &config.remote.base_url;
    if !base.starts_with("http://") && !base.starts_with("https://") {
        errors.push(ValidationError::new(
            "remote.base_url",
            format!("Invalid remote URL: {}", base),
        ));
    }

    for (field, value) in [
        ("remote.login_ttl_secs", config.remote.login_ttl_secs),
        ("remote.connect_timeout_secs", config.remote.connect_timeout_secs),
        ("remote.request_timeout_secs", config.remote.request_timeout_secs),
    ] {
        if value == 0 {
            errors.push(ValidationError::new(field, "Must be greater than 0"));
        }
    }

    if config.store.path.as_os_str().is_empty() {
        errors.push(ValidationError::new("store.path", "Store path cannot be empty"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate configuration and return a Result
pub fn validate_config_result(config: &SyncConfig) -> crate::Result<()> {
    validate_config(config).map_err(|errors| {
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        NoteSyncError::Config(format!(
            "Configuration validation failed:\n  - {}",
            messages.join("\n  - ")
        ))
    })
}
