//! notesync - two-way sync between a local note store and a remote task service
//!
//! Local folders become remote task lists, local notes become tasks, and the
//! local-only fields of every note travel in a metadata shadow task kept in a
//! reserved list.
//!
//! # Architecture
//!
//! - **node**: Remote-side model (TaskList, Task, MetaData) in a typed arena
//! - **remote**: Protocol client, HTTP transport and credentials
//! - **store**: Local note store (trait, row editor, SQLite implementation)
//! - **sync**: The engine and the per-run reconciliation session
//! - **config**: YAML configuration
//! - **retry**: Exponential backoff for transport failures

// Core modules
pub mod config;
pub mod error;
pub mod logging;
pub mod node;
pub mod retry;

// Components
pub mod remote;
pub mod store;
pub mod sync;

// Re-exports
pub use error::{FailureKind, NoteSyncError, Result};
pub use sync::{SyncEngine, SyncEvent, SyncReport, SyncStatus};
