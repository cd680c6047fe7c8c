//! Remote task service
//!
//! - [`GTaskClient`]: session, batching and the wire actions
//! - [`Transport`]: the HTTP seam, with [`HttpTransport`] for real use
//! - [`CredentialSource`]: account name and auth token

mod client;
mod credentials;
mod transport;
pub mod wire;

pub use client::{GTaskClient, UPDATE_BATCH_LIMIT};
pub use credentials::{CredentialSource, EnvCredentials, StaticCredentials};
pub use transport::{HttpReply, HttpTransport, Transport};
