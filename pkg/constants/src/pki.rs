//! Certificate issuance constants.

/// Root CA validity, in days (10 years).
pub const CA_VALIDITY_DAYS: u32 = 3650;

/// Per-node leaf certificate validity, in days.
pub const NODE_VALIDITY_DAYS: u32 = 825;

/// Shared service (HTTP-layer) certificate validity, in days. Matches the CA.
pub const SERVICE_VALIDITY_DAYS: u32 = CA_VALIDITY_DAYS;

/// Length of random certificate serial numbers, in bytes.
/// The top bit is cleared to keep the DER integer positive: 159 bits of entropy.
pub const SERIAL_LEN: usize = 20;

/// Subject country of the root CA and service certificates.
pub const CA_COUNTRY: &str = "OM";

/// Subject organization of the root CA and service certificates.
pub const CA_ORGANIZATION: &str = "ClusterBlade";

/// Subject common name of the root CA.
pub const CA_COMMON_NAME: &str = "ClusterBlade Root CA";

/// Subject organization of per-node certificates.
pub const NODE_ORGANIZATION: &str = "ClusterBlade Node";

/// Subject common name of the shared HTTP-layer certificate.
pub const SERVICE_COMMON_NAME: &str = "Elasticsearch HTTP Layer";

/// Default SAN aliases of the shared HTTP-layer certificate.
pub const DEFAULT_SERVICE_ALIASES: &[&str] = &["localhost", "elasticsearch"];

/// PBKDF2 iteration count for passphrase-encrypted private keys.
pub const KEY_PBKDF2_ITERATIONS: u32 = 600_000;
