//! Retry driver for registry requests.
//!
//! Each attempt reports an [`Outcome`] instead of an error string, and the
//! driver branches on the tag:
//!
//! - `RateLimited` pauses the whole [`RequestQueue`] for an exponential delay
//!   (`base * 2^n`, capped) and retries without spending an ordinary attempt.
//! - `Transient` waits `step * attempt` and spends one attempt.
//! - `NotFound` ends the loop with `Ok(None)`.
//!
//! Running out of attempts surfaces the last failure as
//! [`RegistryError::RetriesExhausted`].

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{RegistryError, Result};

use super::queue::RequestQueue;

/// Result of a single request attempt, tagged by failure kind.
#[derive(Debug)]
pub enum Outcome<T> {
    Ok(T),
    /// A 404 on an endpoint where absence is a valid answer.
    NotFound,
    /// HTTP 429.
    RateLimited(RegistryError),
    /// Any other failure: transport error, non-success status, bad body.
    Transient(RegistryError),
}

/// Retry timing for registry requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Ordinary attempts per request.
    pub max_attempts: u32,
    /// Rate-limit responses tolerated per request, counted apart from `max_attempts`.
    pub max_rate_limit_events: u32,
    /// Linear backoff step for ordinary failures.
    pub retry_step: Duration,
    /// Base of the exponential rate-limit backoff.
    pub rate_limit_base: Duration,
    /// Ceiling of the exponential rate-limit backoff.
    pub rate_limit_cap: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 100,
            max_rate_limit_events: 100,
            retry_step: Duration::from_millis(100),
            rate_limit_base: Duration::from_millis(500),
            rate_limit_cap: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Delay after the `attempt`-th ordinary failure (1-based).
    pub fn linear_delay(&self, attempt: u32) -> Duration {
        self.retry_step.saturating_mul(attempt)
    }

    /// Delay after the `event`-th rate-limit response (1-based).
    pub fn rate_limit_delay(&self, event: u32) -> Duration {
        let factor = 2u32.checked_pow(event).unwrap_or(u32::MAX);
        self.rate_limit_base
            .saturating_mul(factor)
            .min(self.rate_limit_cap)
    }
}

/// Drive `attempt` until it succeeds, reports `NotFound`, or the budget runs out.
///
/// `operation` names the request in logs and in the final error.
pub async fn retry<T, F, Fut>(
    policy: &RetryPolicy,
    queue: &RequestQueue,
    operation: &str,
    mut attempt: F,
) -> Result<Option<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Outcome<T>>,
{
    let mut attempts = 0u32;
    let mut rate_limit_events = 0u32;
    let mut last_error = None;

    while attempts < policy.max_attempts {
        match attempt().await {
            Outcome::Ok(value) => return Ok(Some(value)),
            Outcome::NotFound => return Ok(None),
            Outcome::RateLimited(err) => {
                last_error = Some(err);
                rate_limit_events += 1;
                if rate_limit_events > policy.max_rate_limit_events {
                    break;
                }
                let delay = policy.rate_limit_delay(rate_limit_events);
                warn!(
                    operation,
                    delay_ms = delay.as_millis() as u64,
                    "Rate limited, pausing queue"
                );
                let _paused = queue.pause();
                tokio::time::sleep(delay).await;
            }
            Outcome::Transient(err) => {
                attempts += 1;
                debug!(operation, attempt = attempts, error = %err, "Request failed");
                last_error = Some(err);
                if attempts < policy.max_attempts {
                    tokio::time::sleep(policy.linear_delay(attempts)).await;
                }
            }
        }
    }

    let source = last_error
        .unwrap_or_else(|| RegistryError::Config("retry budget is zero".to_string()));
    Err(RegistryError::RetriesExhausted {
        operation: operation.to_string(),
        attempts: attempts + rate_limit_events,
        source: Box::new(source),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            max_rate_limit_events: 10,
            retry_step: Duration::from_millis(1),
            rate_limit_base: Duration::from_millis(1),
            rate_limit_cap: Duration::from_millis(4),
        }
    }

    fn status(code: u16) -> RegistryError {
        RegistryError::Status {
            status: code,
            url: "http://registry.test/x".to_string(),
        }
    }

    #[test]
    fn test_rate_limit_delay_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.rate_limit_delay(1), Duration::from_millis(1000));
        assert_eq!(policy.rate_limit_delay(2), Duration::from_millis(2000));
        assert_eq!(policy.rate_limit_delay(6), Duration::from_millis(32000));
        assert_eq!(policy.rate_limit_delay(7), Duration::from_secs(60));
        assert_eq!(policy.rate_limit_delay(40), Duration::from_secs(60));
    }

    #[test]
    fn test_linear_delay() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.linear_delay(1), Duration::from_millis(100));
        assert_eq!(policy.linear_delay(5), Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_rate_limits_do_not_consume_attempts() {
        let queue = RequestQueue::new(1);
        let script = Mutex::new(VecDeque::from(vec![
            Outcome::RateLimited(status(429)),
            Outcome::RateLimited(status(429)),
            Outcome::RateLimited(status(429)),
        ]));
        let calls = Mutex::new(0u32);
        let (script_ref, calls_ref) = (&script, &calls);

        let result = retry(&fast_policy(3), &queue, "test", move || async move {
            *calls_ref.lock().unwrap() += 1;
            script_ref.lock().unwrap().pop_front().unwrap_or(Outcome::Ok(9))
        })
        .await
        .unwrap();

        assert_eq!(result, Some(9));
        assert_eq!(*calls.lock().unwrap(), 4);
        assert_eq!(queue.pause_count(), 3);
        assert!(!queue.is_paused());
    }

    #[tokio::test]
    async fn test_transient_failures_exhaust_budget() {
        let queue = RequestQueue::new(1);
        let calls = Mutex::new(0u32);
        let calls_ref = &calls;

        let err = retry(&fast_policy(3), &queue, "get vite", move || async move {
            *calls_ref.lock().unwrap() += 1;
            Outcome::<u32>::Transient(status(500))
        })
        .await
        .unwrap_err();

        assert_eq!(*calls.lock().unwrap(), 3);
        match err {
            RegistryError::RetriesExhausted {
                operation,
                attempts,
                source,
            } => {
                assert_eq!(operation, "get vite");
                assert_eq!(attempts, 3);
                assert_eq!(source.status(), Some(500));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_transient_then_success() {
        let queue = RequestQueue::new(1);
        let script = Mutex::new(VecDeque::from(vec![
            Outcome::Transient(status(502)),
            Outcome::Transient(status(503)),
        ]));
        let script_ref = &script;

        let result = retry(&fast_policy(5), &queue, "test", move || async move {
            script_ref.lock().unwrap().pop_front().unwrap_or(Outcome::Ok(1))
        })
        .await
        .unwrap();
        assert_eq!(result, Some(1));
        assert_eq!(queue.pause_count(), 0);
    }

    #[tokio::test]
    async fn test_not_found_is_empty_result() {
        let queue = RequestQueue::new(1);
        let result = retry(&fast_policy(5), &queue, "test", || async {
            Outcome::<u32>::NotFound
        })
        .await
        .unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_rate_limits_outlast_single_attempt_budget() {
        let queue = RequestQueue::new(1);
        let script = Mutex::new(VecDeque::from(vec![
            Outcome::RateLimited(status(429)),
            Outcome::RateLimited(status(429)),
            Outcome::RateLimited(status(429)),
        ]));
        let script_ref = &script;

        let result = retry(&fast_policy(1), &queue, "test", move || async move {
            script_ref.lock().unwrap().pop_front().unwrap_or(Outcome::Ok(5))
        })
        .await
        .unwrap();
        assert_eq!(result, Some(5));
        assert_eq!(queue.pause_count(), 3);
    }

    #[tokio::test]
    async fn test_endless_rate_limit_is_bounded() {
        let queue = RequestQueue::new(1);
        let calls = Mutex::new(0u32);
        let calls_ref = &calls;

        let err = retry(&fast_policy(2), &queue, "search", move || async move {
            *calls_ref.lock().unwrap() += 1;
            Outcome::<u32>::RateLimited(status(429))
        })
        .await
        .unwrap_err();
        assert_eq!(err.status(), Some(429));
        assert_eq!(*calls.lock().unwrap(), 11);
        assert_eq!(queue.pause_count(), 10);
    }
}
