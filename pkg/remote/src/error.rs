use thiserror::Error;

pub type Result<T> = std::result::Result<T, RemoteError>;

#[derive(Debug, Error)]
pub enum RemoteError {
    /// Authentication or network failure while opening the session.
    #[error("failed to connect to {host}: {reason}")]
    Connect { host: String, reason: String },

    #[error("connection to {host} timed out after {secs}s")]
    Timeout { host: String, secs: u64 },

    /// The session broke while running a command.
    #[error("remote channel error on {host}: {reason}")]
    Transport { host: String, reason: String },

    /// A file copy was rejected by the remote side.
    #[error("failed to transfer {local} to {host}:{remote}: {reason}")]
    Transfer {
        host: String,
        local: String,
        remote: String,
        reason: String,
    },
}
