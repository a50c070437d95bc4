use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;
use pkg_constants::remote::{DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_SSH_PORT};
use pkg_types::NodeIdentity;

/// Result of one remote command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit status; -1 when the process was terminated by a signal.
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// Login material for the remote channel.
#[derive(Clone)]
pub struct Credentials {
    pub user: String,
    password: Option<String>,
    pub identity_file: Option<PathBuf>,
    pub port: u16,
    pub connect_timeout: Duration,
}

impl Credentials {
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: None,
            identity_file: None,
            port: DEFAULT_SSH_PORT,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_identity_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.identity_file = Some(path.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("identity_file", &self.identity_file)
            .field("port", &self.port)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

/// An open session to one host.
///
/// A non-zero exit status is not an error at this layer: callers inspect
/// [`CommandOutput::status`]. Errors mean the channel itself failed.
#[async_trait]
pub trait RemoteSession: Send {
    /// Run a shell command.
    async fn exec(&mut self, command: &str) -> Result<CommandOutput>;

    /// Run a shell command with `input` written to its stdin.
    async fn exec_with_input(&mut self, command: &str, input: &[u8]) -> Result<CommandOutput>;

    /// Copy a local file to `remote_path`.
    async fn upload(&mut self, local: &Path, remote_path: &str) -> Result<()>;

    /// Tear the session down. Called on every exit path; must be idempotent.
    async fn close(&mut self) -> Result<()>;
}

/// Opens [`RemoteSession`]s.
#[async_trait]
pub trait RemoteConnector: Send + Sync {
    async fn connect(
        &self,
        node: &NodeIdentity,
        credentials: &Credentials,
    ) -> Result<Box<dyn RemoteSession>>;
}
