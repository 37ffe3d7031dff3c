use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Decides how many attempts an operation gets and how long to wait between them
pub trait BackoffPolicy {
    /// Total attempts allowed, including the first one
    fn max_attempts(&self) -> u32;

    /// Delay before the next attempt, given how many attempts have failed so far (>= 1)
    fn next_delay(&self, failed_attempts: u32) -> Duration;
}

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first one)
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier applied per retry; 1.0 gives fixed backoff
    pub backoff_multiplier: f64,
}

impl RetryConfig {
    /// Create a new retry configuration with fixed backoff
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 1.0,
        }
    }

    /// Set the maximum delay between retries
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Set the backoff multiplier
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Preset: one translation batch against the generation service.
    /// 3 attempts, fixed 2s between them.
    pub fn translation_batch() -> Self {
        Self::new(3, Duration::from_secs(2))
    }

    /// Preset: catalog and coverage reads from the store.
    /// Delays: 500ms, 1s
    pub fn store_read() -> Self {
        Self::new(3, Duration::from_millis(500))
            .with_max_delay(Duration::from_secs(2))
            .with_backoff_multiplier(2.0)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::translation_batch()
    }
}

impl BackoffPolicy for RetryConfig {
    fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    fn next_delay(&self, failed_attempts: u32) -> Duration {
        if failed_attempts == 0 {
            return Duration::ZERO;
        }

        let delay_ms = self.initial_delay.as_millis() as f64
            * self.backoff_multiplier.powi((failed_attempts - 1) as i32);

        Duration::from_millis(delay_ms as u64).min(self.max_delay)
    }
}

/// Execute an async operation with retries
///
/// Returns the first success, or the last error once the policy's attempts are used up.
/// A policy reporting zero attempts still runs the operation once.
pub async fn with_retry<T, E, F, Fut, P>(
    policy: &P,
    operation_name: &str,
    operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: BackoffPolicy + ?Sized,
{
    with_retry_if(policy, operation_name, operation, |_| true).await
}

/// Execute an async operation with retries, using a predicate to determine if retry is appropriate
pub async fn with_retry_if<T, E, F, Fut, P, R>(
    policy: &P,
    operation_name: &str,
    mut operation: F,
    should_retry: R,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: BackoffPolicy + ?Sized,
    R: Fn(&E) -> bool,
{
    let max_attempts = policy.max_attempts().max(1);
    let mut failed = 0;

    loop {
        match operation().await {
            Ok(result) => {
                if failed > 0 {
                    debug!(
                        "{}: Succeeded on attempt {}/{}",
                        operation_name,
                        failed + 1,
                        max_attempts
                    );
                }
                return Ok(result);
            }
            Err(e) => {
                failed += 1;

                if !should_retry(&e) {
                    debug!(
                        "{}: Error is not retryable, failing immediately: {}",
                        operation_name, e
                    );
                    return Err(e);
                }

                if failed >= max_attempts {
                    warn!(
                        "{}: All {} attempts failed. Last error: {}",
                        operation_name, max_attempts, e
                    );
                    return Err(e);
                }

                let delay = policy.next_delay(failed);
                warn!(
                    "{}: Attempt {}/{} failed ({}), retrying in {:?}",
                    operation_name, failed, max_attempts, e, delay
                );
                if !delay.is_zero() {
                    sleep(delay).await;
                }
            }
        }
    }
}
