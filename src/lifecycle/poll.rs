//! Bounded polling
//!
//! All waiting on eventually-consistent backend state goes through
//! [`poll_until`]: a fixed interval, a fixed elapsed-time budget, and a
//! terminal [`PollOutcome::Exhausted`] once the budget is spent.

use crate::Result;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    interval: Duration,
    max_elapsed: Duration,
}

impl RetryPolicy {
    pub const fn new(interval: Duration, max_elapsed: Duration) -> Self {
        Self {
            interval,
            max_elapsed,
        }
    }

    /// Probe exactly once.
    pub const fn once() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn max_elapsed(&self) -> Duration {
        self.max_elapsed
    }
}

/// Result of a single probe
#[derive(Debug)]
pub enum Attempt<T> {
    Ready(T),
    Pending,
}

#[derive(Debug, PartialEq, Eq)]
pub enum PollOutcome<T> {
    Ready(T),
    Exhausted { waited: Duration, attempts: u32 },
}

impl<T> PollOutcome<T> {
    pub fn ready(self) -> Option<T> {
        match self {
            PollOutcome::Ready(value) => Some(value),
            PollOutcome::Exhausted { .. } => None,
        }
    }
}

/// Run `probe` until it is ready, it fails, or `policy` runs out.
///
/// A probe error ends polling immediately. The call returns no later than
/// `max_elapsed + interval` plus the duration of the last probe.
pub async fn poll_until<T, F, Fut>(policy: RetryPolicy, mut probe: F) -> Result<PollOutcome<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Attempt<T>>>,
{
    let start = Instant::now();
    let mut attempts = 0u32;

    loop {
        attempts += 1;

        if let Attempt::Ready(value) = probe().await? {
            return Ok(PollOutcome::Ready(value));
        }

        let waited = start.elapsed();
        if waited >= policy.max_elapsed {
            return Ok(PollOutcome::Exhausted { waited, attempts });
        }

        trace!(attempts, ?waited, "Probe pending, retrying");
        tokio::time::sleep(policy.interval).await;
    }
}
