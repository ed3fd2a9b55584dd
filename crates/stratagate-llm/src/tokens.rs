//! Token estimation and usage accounting.
//!
//! [`estimate_tokens`] is the one heuristic every budget in the gateway is
//! measured with: the chunker sizes chunks with it, the manager sizes
//! rate-limiter reservations with it, and [`TokenMonitor`] fills in usage
//! records with it when a provider does not report its own count.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use tracing::info;

use stratagate_types::ProviderId;
use stratagate_types::usage::UsageRecord;

/// Characters per token assumed by [`estimate_tokens`].
pub const CHARS_PER_TOKEN: usize = 4;

/// Upper bound on the delay suggested by [`TokenMonitor::check_tpm_limit`].
const MAX_SUGGESTED_DELAY_SECS: f64 = 300.0;

/// Estimate the token count of `text` as `chars / 4`.
pub fn estimate_tokens(text: &str) -> u32 {
    u32::try_from(text.chars().count() / CHARS_PER_TOKEN).unwrap_or(u32::MAX)
}

/// Per-request usage logging plus process-wide running totals.
#[derive(Debug)]
pub struct TokenMonitor {
    max_tpm: u64,
    total_tokens: AtomicU64,
    requests: AtomicU64,
}

impl TokenMonitor {
    pub fn new(max_tpm: u64) -> Self {
        Self {
            max_tpm,
            total_tokens: AtomicU64::new(0),
            requests: AtomicU64::new(0),
        }
    }

    /// Build a usage record for a completed request and log it.
    ///
    /// `tokens_used`, when the provider reported it, is authoritative for
    /// the total: output tokens become `tokens_used - input_tokens`
    /// (floored at zero).
    pub fn log_request(
        &self,
        prompt: &str,
        response_text: &str,
        tokens_used: Option<u32>,
        provider: ProviderId,
        caller_id: Option<&str>,
    ) -> UsageRecord {
        let input_tokens = estimate_tokens(prompt);
        let output_tokens = match tokens_used {
            Some(total) => total.saturating_sub(input_tokens),
            None => estimate_tokens(response_text),
        };
        let total_tokens = input_tokens.saturating_add(output_tokens);

        self.total_tokens
            .fetch_add(u64::from(total_tokens), Ordering::Relaxed);
        self.requests.fetch_add(1, Ordering::Relaxed);

        info!(
            target: "stratagate::usage",
            provider = %provider,
            input_tokens,
            output_tokens,
            total_tokens,
            reported = tokens_used.is_some(),
            caller_id = caller_id.unwrap_or("-"),
            "provider usage"
        );

        UsageRecord {
            input_tokens,
            output_tokens,
            total_tokens,
            provider,
            timestamp: Utc::now(),
            caller_id: caller_id.map(String::from),
        }
    }

    /// Advisory budget check.
    ///
    /// With no current reading the answer is optimistic: the rate limiter
    /// stays authoritative. Otherwise an overflow yields a suggested delay
    /// proportional to the excess, capped at five minutes.
    pub fn check_tpm_limit(&self, estimated: u32, current_tpm: Option<u64>) -> (bool, Option<f64>) {
        let Some(current) = current_tpm else {
            return (true, None);
        };
        let projected = current.saturating_add(u64::from(estimated));
        if projected <= self.max_tpm {
            return (true, None);
        }
        if self.max_tpm == 0 {
            return (false, Some(MAX_SUGGESTED_DELAY_SECS));
        }
        let excess = (projected - self.max_tpm) as f64;
        let delay = (excess / self.max_tpm as f64 * 60.0).min(MAX_SUGGESTED_DELAY_SECS);
        (false, Some(delay))
    }

    pub fn max_tpm(&self) -> u64 {
        self.max_tpm
    }

    /// Tokens recorded since startup.
    pub fn total_tokens(&self) -> u64 {
        self.total_tokens.load(Ordering::Relaxed)
    }

    /// Requests recorded since startup.
    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }
}
