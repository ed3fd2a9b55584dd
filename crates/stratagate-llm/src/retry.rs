//! Fixed-schedule retry loop shared by the HTTP adapters.
//!
//! [`run_with_retry`] is a free helper rather than a provider wrapper: an
//! adapter hands it a closure that performs one call, and gets back the
//! final outcome together with one [`ProviderAttempt`] per call made.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use stratagate_types::config::RetryConfig;
use stratagate_types::{ProviderAttempt, ProviderId, ProviderResult};

use crate::error::{ProviderError, Result};
use crate::provider::Completion;

/// Attempt ceiling and backoff schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of calls, including the first.
    pub attempts: u32,
    /// Delay after failed call `n` (0-indexed). The last entry repeats.
    pub backoff_schedule: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            backoff_schedule: [3, 6, 9, 12, 15]
                .into_iter()
                .map(Duration::from_secs)
                .collect(),
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, backoff_schedule: Vec<Duration>) -> Self {
        Self {
            attempts,
            backoff_schedule,
        }
    }

    /// Exactly one call, never retried.
    pub fn single() -> Self {
        Self::new(1, Vec::new())
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.attempts, config.backoff_schedule())
    }

    /// Delay before the retry that follows failed call `attempt` (0-indexed).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let idx = (attempt as usize).min(self.backoff_schedule.len().saturating_sub(1));
        self.backoff_schedule
            .get(idx)
            .copied()
            .unwrap_or(Duration::ZERO)
    }
}

/// Final outcome of a retry loop.
#[derive(Debug)]
pub struct RetryOutcome {
    /// The successful completion, or the last error observed.
    pub result: Result<Completion>,
    /// One record per call made, in order.
    pub attempts: Vec<ProviderAttempt>,
}

impl RetryOutcome {
    /// Fold the outcome into the caller-facing result shape.
    pub fn into_result(self, provider: ProviderId) -> ProviderResult {
        match self.result {
            Ok(completion) => ProviderResult::ok(provider, completion.text)
                .with_model(completion.model)
                .with_status(Some(200))
                .with_tokens(completion.tokens_used)
                .with_raw(completion.raw)
                .with_attempts(self.attempts),
            Err(err) => ProviderResult::failed(Some(provider), err.to_string())
                .with_status(err.status_code())
                .with_attempts(self.attempts),
        }
    }
}

/// Sleep for `delay` unless `cancel` fires first.
pub(crate) async fn sleep_or_cancel(delay: Duration, cancel: &CancellationToken) -> Result<()> {
    if delay.is_zero() {
        return if cancel.is_cancelled() {
            Err(ProviderError::Cancelled)
        } else {
            Ok(())
        };
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ProviderError::Cancelled),
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// policy's attempt ceiling is reached.
///
/// `op` receives the 0-indexed attempt number. Cancellation aborts both an
/// in-flight call and a pending backoff sleep.
pub async fn run_with_retry<F, Fut>(
    policy: &RetryPolicy,
    provider: ProviderId,
    cancel: &CancellationToken,
    mut op: F,
) -> RetryOutcome
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Completion>>,
{
    let max_attempts = policy.attempts.max(1);
    let mut attempts = Vec::new();
    let mut attempt = 0u32;

    loop {
        if cancel.is_cancelled() {
            return RetryOutcome {
                result: Err(ProviderError::Cancelled),
                attempts,
            };
        }

        let started = Instant::now();
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ProviderError::Cancelled),
            r = op(attempt) => r,
        };
        let latency = elapsed_ms(started);

        let err = match result {
            Ok(completion) => {
                if attempt > 0 {
                    debug!(%provider, attempt, "request succeeded after retry");
                }
                attempts.push(
                    ProviderAttempt::success(provider)
                        .with_status(Some(200))
                        .with_latency(latency)
                        .with_tokens(completion.tokens_used),
                );
                return RetryOutcome {
                    result: Ok(completion),
                    attempts,
                };
            }
            Err(err) => err,
        };

        attempts.push(
            ProviderAttempt::failure(provider, err.to_string())
                .with_status(err.status_code())
                .with_latency(latency),
        );

        if !err.is_retryable() || attempt + 1 >= max_attempts {
            return RetryOutcome {
                result: Err(err),
                attempts,
            };
        }

        let delay = policy.delay_for(attempt);
        warn!(
            %provider,
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "retrying after transient error"
        );

        if let Err(cancelled) = sleep_or_cancel(delay, cancel).await {
            attempts.push(ProviderAttempt::failure(provider, cancelled.to_string()));
            return RetryOutcome {
                result: Err(cancelled),
                attempts,
            };
        }
        attempt += 1;
    }
}
