use crate::clock::Clock;
use crate::config::AiConfig;
use crate::upstream::EndpointError;
use std::future::Future;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub max_retries: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 1000,
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &AiConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay_ms: config.retry_base_delay_ms,
        }
    }

    /// Doubles per attempt: 1s, 2s, 4s, ...
    pub fn delay_for_attempt(&self, attempt: u32) -> u64 {
        self.base_delay_ms
            .saturating_mul(1u64 << attempt.min(16))
    }
}

/// The final error and how many attempts were made.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryFailure {
    pub error: EndpointError,
    pub attempts: u32,
}

/// Runs `operation` until it succeeds, fails with a non-retriable error,
/// or the retries are used up.
pub async fn with_retry<F, Fut, T>(
    policy: RetryPolicy,
    clock: &dyn Clock,
    mut operation: F,
) -> Result<T, RetryFailure>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, EndpointError>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                if !error.is_retriable() || attempt >= policy.max_retries {
                    return Err(RetryFailure {
                        error,
                        attempts: attempt + 1,
                    });
                }
                let delay = policy.delay_for_attempt(attempt);
                warn!(
                    "AI endpoint error (attempt {}/{}): {}, retrying in {}ms",
                    attempt + 1,
                    policy.max_retries + 1,
                    error,
                    delay
                );
                clock.sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
