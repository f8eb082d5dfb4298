use std::time::Duration;

use log::warn;

use crate::core::clock::Clock;
use crate::core::error::{WatchError, WatchResult};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const INITIAL_BACKOFF: Duration = Duration::from_secs(2);
pub const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Bounded exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff: INITIAL_BACKOFF,
            max_backoff: MAX_BACKOFF,
        }
    }
}

impl RetryPolicy {
    /// Backoff before attempt `attempt + 1` (attempts are 1-based).
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let mut backoff = self.initial_backoff;
        for _ in 1..attempt {
            backoff = (backoff * 2).min(self.max_backoff);
        }
        backoff.min(self.max_backoff)
    }

    /// Runs `op` until it succeeds, fails with an error `retryable` rejects,
    /// or the attempt budget is spent.
    pub fn run<T, F, P>(
        &self,
        operation: &'static str,
        clock: &dyn Clock,
        retryable: P,
        mut op: F,
    ) -> WatchResult<T>
    where
        F: FnMut() -> WatchResult<T>,
        P: Fn(&WatchError) -> bool,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let err = match op() {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !retryable(&err) {
                return Err(err);
            }
            if attempt >= max_attempts {
                return Err(WatchError::RetriesExhausted {
                    operation,
                    attempts: attempt,
                    last: Box::new(err),
                });
            }

            let backoff = self.backoff_after(attempt);
            warn!(
                "[retry] {} attempt {}/{} failed: {} (next in {:?})",
                operation, attempt, max_attempts, err, backoff
            );
            if !clock.sleep(backoff) {
                return Err(WatchError::Interrupted);
            }
            attempt += 1;
        }
    }
}
