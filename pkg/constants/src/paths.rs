//! Filesystem path constants.

// ─── Local ────────────────────────────────────────────────────────────────

/// Default config file path for the CLI.
pub const DEFAULT_CONFIG: &str = "/etc/certfleet/config.yaml";

/// Default local certificate directory (CA, per-node leaves, HTTP-layer subdir).
pub const DEFAULT_CERT_DIR: &str = "runtime/certificates";

/// Subdirectory of the certificate directory that holds the HTTP-layer triple.
pub const HTTP_SUBDIR: &str = "https";

/// Root CA certificate filename.
pub const CA_CERT_FILENAME: &str = "ca.pem";

/// Root CA private key filename.
pub const CA_KEY_FILENAME: &str = "ca.key";

/// Extension of per-node certificate files (`<node>.crt`).
pub const NODE_CERT_EXT: &str = "crt";

/// Extension of per-node private key files (`<node>.key`).
pub const NODE_KEY_EXT: &str = "key";

/// HTTP-layer certificate filename inside `HTTP_SUBDIR`.
pub const HTTP_CERT_FILENAME: &str = "http.crt";

/// HTTP-layer private key filename inside `HTTP_SUBDIR`.
pub const HTTP_KEY_FILENAME: &str = "http.key";

/// Copy of the root CA certificate distributed with the HTTP-layer triple.
pub const HTTP_CA_FILENAME: &str = "ca.crt";

/// Node names whose `<name>.crt` / `<name>.key` would land on the root CA files
/// or the HTTP-layer triple, locally or in the remote certificate directory.
pub const RESERVED_NODE_NAMES: [&str; 3] = ["ca", "http", HTTP_SUBDIR];

// ─── Remote ───────────────────────────────────────────────────────────────

/// Certificate directory on every fleet node.
pub const REMOTE_CERT_DIR: &str = "/etc/elasticsearch/certs";

/// Secret store (keystore) file on every fleet node.
pub const REMOTE_SECRET_STORE: &str = "/etc/elasticsearch/elasticsearch.keystore";

/// Secret store management tool on every fleet node.
pub const REMOTE_SECRET_STORE_TOOL: &str = "/usr/share/elasticsearch/bin/elasticsearch-keystore";
