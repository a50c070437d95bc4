//! Local certificate-directory layout.
//!
//! ```text
//! <root>/
//! ├── ca.pem            # root CA certificate
//! ├── ca.key            # root CA private key
//! ├── <node>.crt        # per-node leaf certificate
//! ├── <node>.key        # per-node private key (optionally encrypted)
//! └── https/
//!     ├── http.crt      # shared HTTP-layer certificate
//!     ├── http.key
//!     └── ca.crt        # copy of ca.pem for client trust distribution
//! ```

use pkg_constants::paths;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertDirLayout {
    root: PathBuf,
}

impl CertDirLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ca_cert(&self) -> PathBuf {
        self.root.join(paths::CA_CERT_FILENAME)
    }

    pub fn ca_key(&self) -> PathBuf {
        self.root.join(paths::CA_KEY_FILENAME)
    }

    pub fn node_cert(&self, node_name: &str) -> PathBuf {
        self.root
            .join(format!("{}.{}", node_name, paths::NODE_CERT_EXT))
    }

    pub fn node_key(&self, node_name: &str) -> PathBuf {
        self.root
            .join(format!("{}.{}", node_name, paths::NODE_KEY_EXT))
    }

    pub fn http_dir(&self) -> PathBuf {
        self.root.join(paths::HTTP_SUBDIR)
    }

    pub fn http_cert(&self) -> PathBuf {
        self.http_dir().join(paths::HTTP_CERT_FILENAME)
    }

    pub fn http_key(&self) -> PathBuf {
        self.http_dir().join(paths::HTTP_KEY_FILENAME)
    }

    pub fn http_ca(&self) -> PathBuf {
        self.http_dir().join(paths::HTTP_CA_FILENAME)
    }

    /// True for the two root CA artifacts.
    pub fn is_ca_artifact(&self, path: &Path) -> bool {
        path == self.ca_cert() || path == self.ca_key()
    }
}

impl Default for CertDirLayout {
    fn default() -> Self {
        Self::new(paths::DEFAULT_CERT_DIR)
    }
}
