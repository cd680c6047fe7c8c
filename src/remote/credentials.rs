//! Where the account name and auth token come from

use crate::config::AccountConfig;
use crate::{NoteSyncError, Result};
use async_trait::async_trait;

/// Supplies the account to sync and a token for it
#[async_trait]
pub trait CredentialSource: Send + Sync {
    fn account_name(&self) -> String;

    /// A token for the account; `invalidate` asks for a fresh one after the
    /// previous token was refused
    async fn auth_token(&self, invalidate: bool) -> Result<String>;
}

/// Reads the token from an environment variable on every request
#[derive(Debug, Clone)]
pub struct EnvCredentials {
    account: String,
    env_var: String,
}

impl EnvCredentials {
    pub fn new(account: impl Into<String>, env_var: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            env_var: env_var.into(),
        }
    }

    pub fn from_config(config: &AccountConfig) -> Self {
        Self::new(config.name.clone(), config.token_env.clone())
    }
}

#[async_trait]
impl CredentialSource for EnvCredentials {
    fn account_name(&self) -> String {
        self.account.clone()
    }

    async fn auth_token(&self, invalidate: bool) -> Result<String> {
        if invalidate {
            tracing::debug!(var = %self.env_var, "Token refused, re-reading environment");
        }

        match std::env::var(&self.env_var) {
            Ok(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
            _ => Err(NoteSyncError::Auth(format!(
                "no auth token for {} (set {})",
                self.account, self.env_var
            ))),
        }
    }
}

/// A fixed account and token
#[derive(Debug, Clone)]
pub struct StaticCredentials {
    account: String,
    token: String,
}

impl StaticCredentials {
    pub fn new(account: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            token: token.into(),
        }
    }
}

#[async_trait]
impl CredentialSource for StaticCredentials {
    fn account_name(&self) -> String {
        self.account.clone()
    }

    async fn auth_token(&self, _invalidate: bool) -> Result<String> {
        Ok(self.token.clone())
    }
}
