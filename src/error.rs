//! Error types for notesync
//!
//! Every failure the engine can hit is one variant of [`NoteSyncError`]. The
//! variants fall into two non-overlapping kinds (see [`FailureKind`]): transport
//! failures, which end a run with a network status, and logic failures, which
//! are defects in the data or the engine and end a run with an internal status.

use thiserror::Error;

/// Result type alias for notesync operations
pub type Result<T> = std::result::Result<T, NoteSyncError>;

/// Error type for notesync operations
#[derive(Error, Debug)]
pub enum NoteSyncError {
    /// Network failures that are not tied to a reqwest error (bad status, login refused)
    #[error("Network error: {0}")]
    Network(String),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered but the body could not be decoded
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Authentication errors (no account, token refused)
    #[error("Authentication error: {0}")]
    Auth(String),

    /// A sync action could not be carried out (missing field, unresolved parent, bad action)
    #[error("Action failed: {0}")]
    Action(String),

    /// Local store errors that are not plain SQLite errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// SQLite database errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Another sync is already running on this engine
    #[error("Sync already in progress")]
    InProgress,

    /// Other errors
    #[error("{0}")]
    Other(String),
}

/// The two failure families the engine distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Connection, timeout, undecodable response, refused login
    Transport,
    /// Missing field, illegal state, unresolved mapping, storage fault
    Logic,
}

impl NoteSyncError {
    /// Classify this error
    pub fn kind(&self) -> FailureKind {
        match self {
            NoteSyncError::Network(_)
            | NoteSyncError::Http(_)
            | NoteSyncError::MalformedResponse(_)
            | NoteSyncError::Auth(_) => FailureKind::Transport,
            NoteSyncError::Action(_)
            | NoteSyncError::Storage(_)
            | NoteSyncError::Database(_)
            | NoteSyncError::Json(_)
            | NoteSyncError::Config(_)
            | NoteSyncError::Yaml(_)
            | NoteSyncError::Io(_)
            | NoteSyncError::InProgress
            | NoteSyncError::Other(_) => FailureKind::Logic,
        }
    }

    /// Shorthand for a logic failure while executing a sync action
    pub fn action(msg: impl Into<String>) -> Self {
        NoteSyncError::Action(msg.into())
    }
}

impl crate::retry::RetryableError for NoteSyncError {
    fn is_retryable(&self) -> bool {
        match self {
            // A refused login will be refused again until the user fixes the account
            NoteSyncError::Auth(_) => false,
            e => e.kind() == FailureKind::Transport,
        }
    }
}
