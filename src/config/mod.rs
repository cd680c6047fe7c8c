//! Configuration system
//!
//! Loads ~/.config/notesync/config.yaml with:
//! - The account to sync and the env var carrying its token
//! - Remote service URL, login TTL and HTTP timeouts
//! - The local note database path
//! - Driver retry settings

mod sync_config;
pub mod validation;

pub use sync_config::{AccountConfig, RemoteConfig, RetrySettings, StoreConfig, SyncConfig};
pub use validation::{validate_config, validate_config_result, ValidationError};
