use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use pkg_remote::RemoteError;
use pkg_types::ErrorKind;

pub type Result<T> = std::result::Result<T, DeployError>;

/// A failure scoped to one node. Never propagates past that node's result.
#[derive(Debug, Error)]
pub enum DeployError {
    #[error("invalid deployment context: {0}")]
    Config(String),

    #[error("missing local file: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("command `{command}` failed ({status}): {stderr}")]
    Command {
        command: String,
        status: i32,
        stderr: String,
    },

    #[error("{what} not present after {attempts} attempt(s) over {waited:?}")]
    Timeout {
        what: String,
        attempts: u32,
        waited: Duration,
    },

    #[error("verification failed: {0}")]
    Verification(String),

    #[error("deployment cancelled")]
    Cancelled,
}

impl DeployError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DeployError::Config(_) => ErrorKind::Config,
            DeployError::FileNotFound(_) => ErrorKind::FileNotFound,
            DeployError::Remote(RemoteError::Transfer { .. }) => ErrorKind::Command,
            DeployError::Remote(_) => ErrorKind::Transport,
            DeployError::Command { .. } => ErrorKind::Command,
            DeployError::Timeout { .. } => ErrorKind::Timeout,
            DeployError::Verification(_) => ErrorKind::Verification,
            DeployError::Cancelled => ErrorKind::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_errors_classify_by_variant() {
        let connect = DeployError::from(RemoteError::Timeout {
            host: "10.0.0.1".into(),
            secs: 20,
        });
        assert_eq!(connect.kind(), ErrorKind::Transport);

        let transfer = DeployError::from(RemoteError::Transfer {
            host: "10.0.0.1".into(),
            local: "ca.pem".into(),
            remote: "/etc/elasticsearch/certs/ca.pem".into(),
            reason: "Permission denied".into(),
        });
        assert_eq!(transfer.kind(), ErrorKind::Command);
    }

    #[test]
    fn command_error_carries_stderr() {
        let err = DeployError::Command {
            command: "sudo chmod 640 /x".into(),
            status: 1,
            stderr: "Operation not permitted".into(),
        };
        assert_eq!(err.kind(), ErrorKind::Command);
        assert!(err.to_string().contains("Operation not permitted"));
    }
}
