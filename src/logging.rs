//! Logging configuration using tracing
//!
//! Sync runs log phase boundaries and executed actions. Set `RUST_LOG` to see them.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the tracing subscriber
///
/// Filtering comes from `RUST_LOG` and defaults to "warn" so the CLI stays
/// quiet unless something goes wrong. Output goes to stderr, leaving stdout
/// for progress lines and command output.
///
/// # Example RUST_LOG values
/// - `RUST_LOG=info` - phase boundaries and run summaries
/// - `RUST_LOG=notesync::sync=debug` - every classified action
/// - `RUST_LOG=notesync::remote=trace` - request envelopes
///
/// # Errors
/// Returns an error if the subscriber has already been initialized
pub fn init() -> crate::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_line_number(true),
        )
        .try_init()
        .map_err(|e| crate::NoteSyncError::Other(format!("Failed to initialize tracing: {}", e)))?;

    Ok(())
}

/// Initialize logging for tests (no-op if already initialized)
pub fn init_test() {
    let _ = init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_test_helper() {
        init_test();
        init_test();
    }

    #[test]
    fn test_second_init_fails() {
        init_test();
        assert!(init().is_err());
    }
}
