//! Fleet deployment constants.

/// Interval between secret-store existence probes, in milliseconds.
pub const SECRET_STORE_POLL_INTERVAL_MS: u64 = 500;

/// Number of secret-store existence probes before giving up (5 s total budget).
pub const SECRET_STORE_POLL_ATTEMPTS: u32 = 10;

/// Default number of nodes deployed concurrently. 1 = strictly sequential.
pub const DEFAULT_CONCURRENCY: usize = 1;
