//! Bounded retry over an ordered list of idempotent steps

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

type Backoff = Arc<dyn Fn(u32) -> Duration + Send + Sync>;

/// `(max_attempts, backoff)`; independent of what the steps do.
#[derive(Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    backoff: Backoff,
}

impl RetryPolicy {
    pub fn new<F>(max_attempts: u32, backoff: F) -> Self
    where
        F: Fn(u32) -> Duration + Send + Sync + 'static,
    {
        Self {
            max_attempts,
            backoff: Arc::new(backoff),
        }
    }

    /// Waits `base * attempt` after the n-th failed attempt (1-based).
    pub fn linear(base: Duration, max_attempts: u32) -> Self {
        Self::new(max_attempts, move |attempt| base * attempt)
    }

    /// Delay after failed attempt `attempt`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        (self.backoff)(attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetrySettings::default().policy()
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("first_delay", &self.delay_after(1))
            .finish()
    }
}

/// Serializable form of a linear [`RetryPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
        }
    }
}

impl RetrySettings {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::linear(Duration::from_millis(self.base_delay_ms), self.max_attempts)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RetryError<E: fmt::Debug + fmt::Display> {
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: E },

    #[error("retry policy allows no attempts")]
    NoAttempts,

    #[error("cancelled before setup completed")]
    Cancelled,
}

type StepFn<'a, E> = Box<dyn Fn() -> BoxFuture<'a, Result<(), E>> + Send + Sync + 'a>;

/// A named, re-runnable step.
pub struct RetryStep<'a, E> {
    name: String,
    run: StepFn<'a, E>,
}

impl<'a, E> RetryStep<'a, E> {
    pub fn new<F>(name: impl Into<String>, run: F) -> Self
    where
        F: Fn() -> BoxFuture<'a, Result<(), E>> + Send + Sync + 'a,
    {
        Self {
            name: name.into(),
            run: Box::new(run),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Run `steps` in order; on any failure wait per `policy` and start over from
/// the first step. Returns the number of attempts used.
///
/// No delay follows the final failed attempt.
pub async fn run_steps<E>(
    policy: &RetryPolicy,
    steps: &[RetryStep<'_, E>],
) -> Result<u32, RetryError<E>>
where
    E: fmt::Debug + fmt::Display,
{
    if policy.max_attempts == 0 {
        return Err(RetryError::NoAttempts);
    }

    let mut attempt = 1;
    loop {
        info!(attempt, max_attempts = policy.max_attempts, "running setup steps");
        let mut failure = None;
        for step in steps {
            if let Err(err) = (step.run)().await {
                warn!(attempt, step = %step.name, error = %err, "setup step failed");
                failure = Some(err);
                break;
            }
        }

        let Some(err) = failure else {
            return Ok(attempt);
        };
        if attempt >= policy.max_attempts {
            return Err(RetryError::Exhausted {
                attempts: attempt,
                last: err,
            });
        }
        let delay = policy.delay_after(attempt);
        info!(attempt, delay_ms = delay.as_millis() as u64, "retrying after backoff");
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    #[test]
    fn linear_backoff_scales_with_attempt() {
        let policy = RetryPolicy::linear(Duration::from_millis(500), 3);
        assert_eq!(policy.delay_after(1), Duration::from_millis(500));
        assert_eq!(policy.delay_after(2), Duration::from_millis(1000));
        assert_eq!(RetryPolicy::default().max_attempts, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn restarts_from_the_first_step() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let failures = Arc::new(AtomicU32::new(1));

        let first_log = log.clone();
        let second_log = log.clone();
        let remaining = failures.clone();
        let steps = vec![
            RetryStep::new("groups", move || {
                let log = first_log.clone();
                async move {
                    log.lock().push("groups");
                    Ok::<(), String>(())
                }
                .boxed()
            }),
            RetryStep::new("resource", move || {
                let log = second_log.clone();
                let remaining = remaining.clone();
                async move {
                    log.lock().push("resource");
                    if remaining.fetch_sub(1, Ordering::SeqCst) > 0 {
                        return Err("toolbar not ready".to_string());
                    }
                    Ok(())
                }
                .boxed()
            }),
        ];

        let started = Instant::now();
        let attempts = run_steps(&RetryPolicy::linear(Duration::from_millis(500), 3), &steps)
            .await
            .unwrap();
        assert_eq!(attempts, 2);
        assert_eq!(*log.lock(), vec!["groups", "resource", "groups", "resource"]);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(500) && elapsed < Duration::from_millis(510));
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_surfaces_the_last_error_without_a_trailing_sleep() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let steps = vec![RetryStep::new("always", move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            async move { Err::<(), _>(format!("failure {n}")) }.boxed()
        })];

        let started = Instant::now();
        let err = run_steps(&RetryPolicy::linear(Duration::from_millis(500), 3), &steps)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            RetryError::Exhausted {
                attempts: 3,
                last: "failure 3".to_string()
            }
        );
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 500 + 1000, nothing after the third failure
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(1500) && elapsed < Duration::from_millis(1510));
    }

    #[tokio::test]
    async fn zero_attempts_is_an_error() {
        let steps: Vec<RetryStep<'_, String>> = Vec::new();
        let err = run_steps(&RetryPolicy::linear(Duration::ZERO, 0), &steps)
            .await
            .unwrap_err();
        assert_eq!(err, RetryError::NoAttempts);
    }
}
