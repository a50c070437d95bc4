//! Bounded, cancellable polling for remote side effects.
//!
//! Waits use `tokio::time`, so tests drive them with a paused clock.

use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use pkg_constants::deploy::{SECRET_STORE_POLL_ATTEMPTS, SECRET_STORE_POLL_INTERVAL_MS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Poller {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for Poller {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(SECRET_STORE_POLL_INTERVAL_MS),
            max_attempts: SECRET_STORE_POLL_ATTEMPTS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollError {
    Exhausted { attempts: u32, waited: Duration },
    Cancelled,
}

impl Poller {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Total time spent waiting when every attempt misses.
    pub fn budget(&self) -> Duration {
        self.interval * self.max_attempts
    }

    /// Begin a polling round. The caller probes, then calls
    /// [`PollRound::miss`] after each negative probe.
    pub fn start<'a>(&self, cancel: &'a CancellationToken) -> PollRound<'a> {
        PollRound {
            poller: *self,
            cancel,
            attempts: 0,
            started: Instant::now(),
        }
    }
}

/// One polling round in progress.
pub struct PollRound<'a> {
    poller: Poller,
    cancel: &'a CancellationToken,
    attempts: u32,
    started: Instant,
}

impl PollRound<'_> {
    /// Record a negative probe and sleep one interval. Returns
    /// [`PollError::Exhausted`] once the attempt budget is spent and
    /// [`PollError::Cancelled`] as soon as the token fires.
    pub async fn miss(&mut self) -> Result<(), PollError> {
        self.attempts += 1;
        tokio::select! {
            _ = self.cancel.cancelled() => return Err(PollError::Cancelled),
            _ = tokio::time::sleep(self.poller.interval) => {}
        }
        if self.attempts >= self.poller.max_attempts {
            return Err(PollError::Exhausted {
                attempts: self.attempts,
                waited: self.started.elapsed(),
            });
        }
        Ok(())
    }

    /// Probes made so far, counting the one in flight.
    pub fn attempt(&self) -> u32 {
        self.attempts + 1
    }
}
