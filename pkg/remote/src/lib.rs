//! Remote execution channel used to push certificates onto fleet nodes.
//!
//! The orchestrator only sees the [`RemoteConnector`] / [`RemoteSession`]
//! traits. [`SshConnector`] drives the system OpenSSH client.

pub mod error;
pub mod quote;
pub mod session;
pub mod ssh;

pub use error::{RemoteError, Result};
pub use quote::shell_quote;
pub use session::{CommandOutput, Credentials, RemoteConnector, RemoteSession};
pub use ssh::SshConnector;
