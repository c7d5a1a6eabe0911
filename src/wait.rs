//! Shared polling helper for drivers that wait on provider state.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::{Instant, sleep};

/// Errors returned by [`poll_until`].
#[derive(Debug, Error, Eq, PartialEq)]
pub enum WaitError<E> {
    /// The deadline passed before the check produced a value.
    #[error("timeout waiting for {action} after {waited:?}")]
    Timeout {
        /// Description of what was being waited on.
        action: String,
        /// Total time spent polling.
        waited: Duration,
    },
    /// The check itself failed.
    #[error(transparent)]
    Check(E),
}

/// Interval and deadline for a polling loop.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PollSchedule {
    /// Delay between two checks.
    pub interval: Duration,
    /// Upper bound on the total time spent polling.
    pub timeout: Duration,
}

impl PollSchedule {
    /// Creates a schedule from an interval and a timeout.
    #[must_use]
    pub const fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }
}

/// Repeatedly runs `check` until it yields `Some`, fails, or the schedule's
/// timeout elapses.
///
/// The check always runs at least once, so a zero timeout still observes the
/// current state.
///
/// # Errors
///
/// Returns [`WaitError::Check`] as soon as `check` fails and
/// [`WaitError::Timeout`] once the deadline has passed.
pub async fn poll_until<T, E, F, Fut>(
    action: &str,
    schedule: PollSchedule,
    mut check: F,
) -> Result<T, WaitError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
{
    let started = Instant::now();
    let deadline = started + schedule.timeout;
    loop {
        if let Some(value) = check().await.map_err(WaitError::Check)? {
            return Ok(value);
        }
        if Instant::now() + schedule.interval > deadline {
            break;
        }
        sleep(schedule.interval).await;
    }

    tracing::debug!(action, "poll deadline reached");
    Err(WaitError::Timeout {
        action: action.to_owned(),
        waited: started.elapsed(),
    })
}
