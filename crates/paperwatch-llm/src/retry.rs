//! Bounded retry with exponential backoff around LLM calls.
//!
//! One policy applies uniformly: transport errors, 408/429/5xx, and
//! malformed model output are retryable; other API errors are terminal.
//! The per-call budget is what keeps a single paper from blocking a run.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::backend::LlmError;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based): base × 2^attempt, capped.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt));
        exp.min(self.max_delay)
    }

    pub fn is_retryable(err: &LlmError) -> bool {
        match err {
            LlmError::Http(_) => true,
            LlmError::RateLimited => true,
            LlmError::Api { status, .. } => *status == 408 || *status >= 500,
            LlmError::MalformedOutput(_) => true,
            LlmError::Serde(_) => true,
            LlmError::Unavailable(_) => false,
        }
    }

    /// Run `op` until it succeeds, fails terminally, or the budget runs out.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, LlmError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, LlmError>>,
    {
        let mut attempt = 0u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if Self::is_retryable(&err) && attempt + 1 < self.max_attempts => {
                    let delay = self.backoff_delay(attempt);
                    warn!(
                        %label,
                        attempt = attempt + 1,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "LLM call failed; backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
