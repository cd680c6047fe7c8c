//! Backoff between whole sync runs
//!
//! The engine never retries on its own: a failed run leaves both replicas in a
//! state the next run converges from. The driver decides whether to run again,
//! and this module gives it the delay schedule for doing so.

use crate::config::RetrySettings;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Backoff policy for repeated sync runs
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Runs after the first failed one
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Stretch each delay by up to a quarter
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(120),
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Build a policy from the `retry` section of the config file
    pub fn from_settings(settings: &RetrySettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            initial_backoff: Duration::from_millis(settings.initial_backoff_ms),
            ..Default::default()
        }
    }

    /// Delay before retry number `attempt` (0-based); doubles until `max_backoff`
    pub fn backoff_duration(&self, attempt: u32) -> Duration {
        let doubled = self
            .initial_backoff
            .checked_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX))
            .unwrap_or(self.max_backoff);
        let delay = doubled.min(self.max_backoff);

        if self.jitter {
            delay.mul_f64(1.0 + clock_fraction() / 4.0)
        } else {
            delay
        }
    }
}

/// 0.0..1.0 from the clock's sub-second part
fn clock_fraction() -> f64 {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    f64::from(nanos % 1000) / 1000.0
}

/// Errors that know whether running again could help
pub trait RetryableError {
    fn is_retryable(&self) -> bool;
}

/// Run `operation` until it succeeds, fails for good, or runs out of retries
pub async fn with_retry<F, Fut, T, E>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: RetryableError + std::fmt::Display,
{
    let mut attempt = 0;

    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        if !err.is_retryable() {
            debug!(operation = operation_name, attempt, error = %err, "Not retrying");
            return Err(err);
        }
        if attempt >= config.max_retries {
            warn!(
                operation = operation_name,
                attempts = attempt + 1,
                error = %err,
                "Giving up"
            );
            return Err(err);
        }

        let backoff = config.backoff_duration(attempt);
        warn!(
            operation = operation_name,
            attempt = attempt + 1,
            backoff_ms = backoff.as_millis() as u64,
            error = %err,
            "Running again"
        );
        sleep(backoff).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NoteSyncError;

    fn fast() -> RetryConfig {
        RetryConfig {
            max_retries: 2,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
            jitter: false,
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let config = RetryConfig {
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(10),
            jitter: false,
            ..Default::default()
        };

        assert_eq!(config.backoff_duration(0), Duration::from_secs(1));
        assert_eq!(config.backoff_duration(1), Duration::from_secs(2));
        assert_eq!(config.backoff_duration(3), Duration::from_secs(8));
        assert_eq!(config.backoff_duration(5), Duration::from_secs(10));
        assert_eq!(config.backoff_duration(40), Duration::from_secs(10));
    }

    #[test]
    fn test_jitter_stays_within_a_quarter() {
        let config = RetryConfig {
            initial_backoff: Duration::from_secs(4),
            ..Default::default()
        };
        let delay = config.backoff_duration(0);
        assert!(delay >= Duration::from_secs(4));
        assert!(delay <= Duration::from_secs(5));
    }

    #[test]
    fn test_from_settings() {
        let settings = RetrySettings {
            max_retries: 5,
            initial_backoff_ms: 250,
        };
        let config = RetryConfig::from_settings(&settings);
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.initial_backoff, Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_network_failures_are_retried() {
        let mut attempts = 0;

        let result: Result<u32, NoteSyncError> = with_retry(&fast(), "sync", || {
            attempts += 1;
            let current = attempts;
            async move {
                if current < 3 {
                    Err(NoteSyncError::Network("connection reset".into()))
                } else {
                    Ok(current)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_logic_failures_are_not_retried() {
        let mut attempts = 0;

        let result: Result<(), NoteSyncError> = with_retry(&fast(), "sync", || {
            attempts += 1;
            async { Err(NoteSyncError::action("unknown sync action")) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts, 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let mut attempts = 0;

        let result: Result<(), NoteSyncError> = with_retry(&fast(), "sync", || {
            attempts += 1;
            async { Err(NoteSyncError::Network("timeout".into())) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts, 3);
    }
}
