//! Remote execution constants.

/// Default SSH port.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Default SSH connect timeout, in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 20;

/// Service account owning the deployed certificates.
pub const DEFAULT_SERVICE_USER: &str = "elasticsearch";

/// Group owning the deployed certificates.
pub const DEFAULT_SERVICE_GROUP: &str = "elasticsearch";

/// Mode applied to every deployed certificate file.
pub const REMOTE_FILE_MODE: &str = "640";

/// Secret store entry holding the transport key passphrase.
pub const DEFAULT_SECRET_ENTRY: &str = "xpack.security.transport.ssl.secure_key_passphrase";

/// Environment variable `sshpass -e` reads the password from.
pub const SSHPASS_ENV: &str = "SSHPASS";
