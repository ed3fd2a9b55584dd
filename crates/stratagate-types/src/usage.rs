//! Token usage records and rate-limit snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::provider::ProviderId;

/// Token accounting for one completed request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    /// Estimated tokens in the prompt.
    pub input_tokens: u32,
    /// Tokens in the response (authoritative when the provider reported usage).
    pub output_tokens: u32,
    /// `input_tokens + output_tokens`.
    pub total_tokens: u32,
    /// Provider that served the request.
    pub provider: ProviderId,
    /// When the record was produced.
    pub timestamp: DateTime<Utc>,
    /// Identity of the caller on whose behalf the request ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caller_id: Option<String>,
}

/// Point-in-time view of the tokens-per-minute budget.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    /// Tokens recorded within the trailing 60 seconds.
    pub current_tpm: u64,
    /// Configured budget.
    pub max_tpm: u64,
    /// `max_tpm - current_tpm`, floored at zero.
    pub available_tpm: u64,
    /// `current_tpm / max_tpm * 100`.
    pub usage_percent: f64,
}

impl UsageSnapshot {
    /// Build a snapshot from the current window total and the budget.
    pub fn new(current_tpm: u64, max_tpm: u64) -> Self {
        let usage_percent = if max_tpm == 0 {
            0.0
        } else {
            current_tpm as f64 / max_tpm as f64 * 100.0
        };
        Self {
            current_tpm,
            max_tpm,
            available_tpm: max_tpm.saturating_sub(current_tpm),
            usage_percent,
        }
    }
}
