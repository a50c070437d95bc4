use std::path::PathBuf;
use thiserror::Error;

use pkg_types::ErrorKind;

pub type Result<T> = std::result::Result<T, PkiError>;

/// Errors raised while creating, loading or issuing certificates.
/// Every one of them is fatal to a generation run.
#[derive(Debug, Error)]
pub enum PkiError {
    #[error("certificate directory {path} is not writable: {source}")]
    DirectoryUnwritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("missing CA material: {0}")]
    MissingCa(PathBuf),

    #[error("certificate generation failed: {0}")]
    Generation(#[from] rcgen::Error),

    #[error("invalid certificate: {0}")]
    InvalidCertificate(String),

    #[error("private key encryption failed: {0}")]
    KeyEncryption(String),

    #[error("certificate chain verification failed for {subject}: {reason}")]
    ChainVerification { subject: String, reason: String },

    #[error("invalid subject alternative name '{0}'")]
    InvalidSan(String),

    #[error("node '{name}' would overwrite CA file {path}")]
    ReservedPath { name: String, path: PathBuf },
}

impl PkiError {
    /// Error classification used when reporting the failure.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PkiError::DirectoryUnwritable { .. } | PkiError::Write { .. } | PkiError::Read { .. } => {
                ErrorKind::Io
            }
            PkiError::MissingCa(_) => ErrorKind::FileNotFound,
            PkiError::ChainVerification { .. } => ErrorKind::Verification,
            PkiError::InvalidSan(_) | PkiError::ReservedPath { .. } => ErrorKind::Config,
            PkiError::Generation(_)
            | PkiError::InvalidCertificate(_)
            | PkiError::KeyEncryption(_) => ErrorKind::Io,
        }
    }
}
