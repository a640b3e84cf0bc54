/// Bounded retry with a linear backoff between attempts.
use std::future::Future;
use std::time::Duration;

use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Never less than 1.
    pub max_attempts: u32,
    /// Delay after failed attempt `k` is `k * backoff_step`.
    pub backoff_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_step: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_step: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_step,
        }
    }

    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff_step.saturating_mul(attempt)
    }
}

#[derive(Debug, PartialEq)]
pub struct Retried<T> {
    pub value: T,
    pub attempts: u32,
}

#[derive(Debug, PartialEq)]
pub struct RetryFailure<E> {
    pub last_error: E,
    pub attempts: u32,
}

/// Runs `op` until it succeeds, the error is not retryable, or the attempt
/// budget is spent. `before_retry` runs before every attempt after the first
/// and receives the upcoming attempt number.
pub async fn with_retry<T, E, Op, Fut, Hook, HookFut>(
    policy: &RetryPolicy,
    is_retryable: impl Fn(&E) -> bool,
    mut before_retry: Hook,
    mut op: Op,
) -> Result<Retried<T>, RetryFailure<E>>
where
    Op: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    Hook: FnMut(u32) -> HookFut,
    HookFut: Future<Output = ()>,
    E: std::fmt::Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        if attempt > 1 {
            before_retry(attempt).await;
        }

        match op(attempt).await {
            Ok(value) => {
                return Ok(Retried {
                    value,
                    attempts: attempt,
                })
            }
            Err(e) => {
                if attempt >= max_attempts || !is_retryable(&e) {
                    return Err(RetryFailure {
                        last_error: e,
                        attempts: attempt,
                    });
                }

                let delay = policy.delay_after(attempt);
                warn!(
                    "Attempt {}/{} failed: {}; retrying in {:?}",
                    attempt, max_attempts, e, delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(1000))
    }

    #[test]
    fn test_delay_grows_linearly() {
        let p = policy(3);
        assert_eq!(p.delay_after(1), Duration::from_millis(1000));
        assert_eq!(p.delay_after(2), Duration::from_millis(2000));
    }

    #[test]
    fn test_zero_attempts_is_clamped_to_one() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_first_attempt_skips_hook() {
        let hooks = Arc::new(Mutex::new(Vec::new()));
        let seen = hooks.clone();

        let result = with_retry(
            &policy(3),
            |_: &String| true,
            move |n| {
                seen.lock().unwrap().push(n);
                async {}
            },
            |_| async { Ok::<_, String>(7) },
        )
        .await
        .unwrap();

        assert_eq!(result, Retried { value: 7, attempts: 1 });
        assert!(hooks.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_second_attempt_after_backoff() {
        let hooks = Arc::new(Mutex::new(Vec::new()));
        let seen = hooks.clone();
        let started = tokio::time::Instant::now();

        let result = with_retry(
            &policy(3),
            |_: &String| true,
            move |n| {
                seen.lock().unwrap().push(n);
                async {}
            },
            |attempt| async move {
                if attempt == 1 {
                    Err("timeout".to_string())
                } else {
                    Ok(attempt)
                }
            },
        )
        .await
        .unwrap();

        assert_eq!(result.attempts, 2);
        assert_eq!(*hooks.lock().unwrap(), vec![2]);
        assert!(started.elapsed() >= Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_budget_and_reports_last_error() {
        let started = tokio::time::Instant::now();

        let failure = with_retry(
            &policy(3),
            |_: &String| true,
            |_| async {},
            |attempt| async move { Err::<(), _>(format!("failure {attempt}")) },
        )
        .await
        .unwrap_err();

        assert_eq!(failure.attempts, 3);
        assert_eq!(failure.last_error, "failure 3");
        // 1s after the first failure, 2s after the second, none after the last.
        assert!(started.elapsed() >= Duration::from_millis(3000));
        assert!(started.elapsed() < Duration::from_millis(6000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_error_stops_immediately() {
        let failure = with_retry(
            &policy(5),
            |e: &String| e != "unauthorized",
            |_| async {},
            |_| async { Err::<(), _>("unauthorized".to_string()) },
        )
        .await
        .unwrap_err();

        assert_eq!(failure.attempts, 1);
    }
}
