//! Bounded retry with exponential backoff.
//!
//! Wraps transport calls as a decorator so the policy can differ per call
//! kind. Only transient transport statuses are retried; codec and
//! server-logic errors surface immediately, and after the attempt bound is
//! exhausted the last error is returned to the caller.

use std::future::Future;
use std::time::Duration;

use crate::error::Result;

/// Backoff parameters for one kind of call.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, the first one included.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub multiplier: f64,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 4,
            initial_backoff: Duration::from_millis(250),
            multiplier: 2.0,
            max_backoff: Duration::from_secs(4),
        }
    }
}

impl RetryPolicy {
    /// A policy that gives up after the first failure.
    pub fn no_retry() -> Self {
        RetryPolicy {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Delay before re-running attempt `attempt + 1` (zero-based), capped.
    /// The cap applies in float space, so a high attempt count cannot
    /// overflow the delay computation.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt.min(i32::MAX as u32) as i32);
        let scaled = self.initial_backoff.as_secs_f64() * factor;
        if scaled.is_finite() && scaled >= 0.0 && scaled < self.max_backoff.as_secs_f64() {
            Duration::from_secs_f64(scaled)
        } else {
            self.max_backoff
        }
    }
}

/// Run `op`, re-invoking it on transient failures per `policy`.
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt + 1 < policy.max_attempts => {
                let delay = policy.backoff(attempt);
                tracing::debug!(
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient transport error, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
