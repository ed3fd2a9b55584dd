//! Configuration schema types.
//!
//! [`GatewayConfig`] is populated once at startup and read-only afterwards.
//! All structs accept both `snake_case` and `camelCase` field names in JSON
//! via `#[serde(alias)]`; unknown fields are ignored.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, Result};
use crate::provider::ProviderId;
use crate::secret::SecretString;

// ── Root config ──────────────────────────────────────────────────────────

/// Root configuration for the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Tokens-per-minute admission control.
    #[serde(default, alias = "rateLimit")]
    pub rate_limit: RateLimitConfig,

    /// Oversized prompt splitting.
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Per-call retry policy of the chat-completion adapters.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Per-request HTTP timeout in seconds.
    #[serde(default = "default_http_timeout_secs", alias = "httpTimeoutSecs")]
    pub http_timeout_secs: u64,

    /// Providers to try, in order. Entries may be aliases.
    #[serde(default = "default_priority")]
    pub priority: Vec<String>,

    /// When set, only this provider is ever tried, regardless of `priority`.
    #[serde(default, alias = "pinnedProvider")]
    pub pinned_provider: Option<String>,

    /// Extra alias -> canonical provider id entries.
    #[serde(default)]
    pub aliases: HashMap<String, String>,

    /// Per-provider credentials and model settings.
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Bounds of the per-caller manager cache.
    #[serde(default, alias = "managerCache")]
    pub manager_cache: ManagerCacheConfig,
}

fn default_http_timeout_secs() -> u64 {
    120
}

fn default_priority() -> Vec<String> {
    ProviderId::ALL.iter().map(|p| p.as_str().to_string()).collect()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            rate_limit: RateLimitConfig::default(),
            chunking: ChunkingConfig::default(),
            retry: RetryConfig::default(),
            http_timeout_secs: default_http_timeout_secs(),
            priority: default_priority(),
            pinned_provider: None,
            aliases: HashMap::new(),
            providers: ProvidersConfig::default(),
            manager_cache: ManagerCacheConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Read and parse a JSON config file. Not validated.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// HTTP timeout as a [`Duration`].
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Resolve a provider name through the configured and built-in aliases.
    pub fn resolve_provider(&self, name: &str) -> Option<ProviderId> {
        ProviderId::normalize_with(name, &self.aliases)
    }

    /// Check semantic constraints serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.rate_limit.max_tpm == 0 {
            return Err(invalid("rate_limit.max_tpm must be greater than zero"));
        }
        if self.chunking.max_tokens_per_chunk == 0 {
            return Err(invalid("chunking.max_tokens_per_chunk must be greater than zero"));
        }
        if self.retry.attempts == 0 {
            return Err(invalid("retry.attempts must be at least 1"));
        }
        if self.retry.backoff_schedule_secs.is_empty() {
            return Err(invalid("retry.backoff_schedule_secs must not be empty"));
        }
        check_delay("rate_limit.acquire_timeout_secs", self.rate_limit.acquire_timeout_secs)?;
        check_delay("rate_limit.backoff_base_secs", self.rate_limit.backoff_base_secs)?;
        for secs in &self.retry.backoff_schedule_secs {
            check_delay("retry.backoff_schedule_secs", *secs)?;
        }
        if self.manager_cache.capacity == 0 {
            return Err(invalid("manager_cache.capacity must be greater than zero"));
        }
        for (alias, target) in &self.aliases {
            if ProviderId::normalize(target).is_none() {
                return Err(invalid(format!(
                    "alias '{alias}' points at unknown provider '{target}'"
                )));
            }
        }
        for name in &self.priority {
            if self.resolve_provider(name).is_none() {
                return Err(invalid(format!("unknown provider in priority: '{name}'")));
            }
        }
        if let Some(ref pinned) = self.pinned_provider
            && self.resolve_provider(pinned).is_none()
        {
            return Err(invalid(format!("unknown pinned provider: '{pinned}'")));
        }
        Ok(())
    }
}

/// Upper bound for any configured delay, in seconds (one day).
pub const MAX_DELAY_SECS: f64 = 86_400.0;

fn check_delay(field: &str, secs: f64) -> Result<()> {
    if !secs.is_finite() || secs < 0.0 {
        return Err(invalid(format!("{field} must be a non-negative number of seconds")));
    }
    if secs > MAX_DELAY_SECS {
        return Err(invalid(format!(
            "{field} must not exceed {MAX_DELAY_SECS} seconds"
        )));
    }
    Ok(())
}

/// Seconds to [`Duration`], clamped to `0..=MAX_DELAY_SECS`. NaN maps to zero.
fn clamped_secs(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs.clamp(0.0, MAX_DELAY_SECS)).unwrap_or(Duration::ZERO)
}

fn invalid(reason: impl Into<String>) -> GatewayError {
    GatewayError::ConfigInvalid {
        reason: reason.into(),
    }
}

// ── Rate limiting ────────────────────────────────────────────────────────

/// Sliding-window token budget settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Tokens allowed per trailing 60 seconds.
    #[serde(default = "default_max_tpm", alias = "maxTpm")]
    pub max_tpm: u64,

    /// How long a request waits for capacity before the provider is skipped.
    #[serde(default = "default_acquire_timeout_secs", alias = "acquireTimeoutSecs")]
    pub acquire_timeout_secs: f64,

    /// Base delay of the escalating 429 backoff.
    #[serde(default = "default_backoff_base_secs", alias = "backoffBaseSecs")]
    pub backoff_base_secs: f64,

    /// Upper bound on a single capacity re-check wait.
    #[serde(default = "default_poll_interval_ms", alias = "pollIntervalMs")]
    pub poll_interval_ms: u64,
}

fn default_max_tpm() -> u64 {
    90_000
}
fn default_acquire_timeout_secs() -> f64 {
    60.0
}
fn default_backoff_base_secs() -> f64 {
    3.0
}
fn default_poll_interval_ms() -> u64 {
    500
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_tpm: default_max_tpm(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
            backoff_base_secs: default_backoff_base_secs(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl RateLimitConfig {
    pub fn acquire_timeout(&self) -> Duration {
        clamped_secs(self.acquire_timeout_secs)
    }

    pub fn backoff_base(&self) -> Duration {
        clamped_secs(self.backoff_base_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

// ── Chunking ─────────────────────────────────────────────────────────────

/// Text chunker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Token budget of a single chunk.
    #[serde(default = "default_max_tokens_per_chunk", alias = "maxTokensPerChunk")]
    pub max_tokens_per_chunk: u32,
}

fn default_max_tokens_per_chunk() -> u32 {
    1500
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens_per_chunk: default_max_tokens_per_chunk(),
        }
    }
}

// ── Retry ────────────────────────────────────────────────────────────────

/// Retry policy of the chat-completion adapters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempt ceiling, including the first call.
    #[serde(default = "default_retry_attempts")]
    pub attempts: u32,

    /// Backoff before retry `n` (0-indexed); the last entry repeats.
    #[serde(default = "default_backoff_schedule", alias = "backoffScheduleSecs")]
    pub backoff_schedule_secs: Vec<f64>,
}

fn default_retry_attempts() -> u32 {
    5
}
fn default_backoff_schedule() -> Vec<f64> {
    vec![3.0, 6.0, 9.0, 12.0, 15.0]
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: default_retry_attempts(),
            backoff_schedule_secs: default_backoff_schedule(),
        }
    }
}

impl RetryConfig {
    /// The backoff schedule as [`Duration`]s.
    pub fn backoff_schedule(&self) -> Vec<Duration> {
        self.backoff_schedule_secs
            .iter()
            .map(|s| clamped_secs(*s))
            .collect()
    }
}

// ── Providers ────────────────────────────────────────────────────────────

/// Credentials and model settings for one provider.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProviderSettings {
    /// API key. Empty means "look it up in the environment".
    #[serde(default, alias = "apiKey")]
    pub api_key: SecretString,

    /// Endpoint override (e.g. for proxies).
    #[serde(default, alias = "apiBase")]
    pub api_base: Option<String>,

    /// Default model override.
    #[serde(default)]
    pub model: Option<String>,

    /// Extra model candidates tried after `model` (Gemini only).
    #[serde(default, alias = "fallbackModels")]
    pub fallback_models: Vec<String>,
}

/// Settings for every supported provider.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvidersConfig {
    /// OpenAI.
    #[serde(default)]
    pub openai: ProviderSettings,

    /// DeepSeek.
    #[serde(default)]
    pub deepseek: ProviderSettings,

    /// Groq.
    #[serde(default)]
    pub groq: ProviderSettings,

    /// OpenRouter.
    #[serde(default)]
    pub openrouter: ProviderSettings,

    /// Google Gemini.
    #[serde(default)]
    pub gemini: ProviderSettings,

    /// Cohere.
    #[serde(default)]
    pub cohere: ProviderSettings,
}

impl ProvidersConfig {
    /// Settings for a given provider.
    pub fn get(&self, id: ProviderId) -> &ProviderSettings {
        match id {
            ProviderId::OpenAi => &self.openai,
            ProviderId::DeepSeek => &self.deepseek,
            ProviderId::Groq => &self.groq,
            ProviderId::OpenRouter => &self.openrouter,
            ProviderId::Gemini => &self.gemini,
            ProviderId::Cohere => &self.cohere,
        }
    }
}

// ── Manager cache ────────────────────────────────────────────────────────

/// Bounds of the per-caller provider manager cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerCacheConfig {
    /// Maximum number of cached managers.
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,

    /// Idle time after which a cached manager is dropped.
    #[serde(default = "default_cache_ttl_secs", alias = "ttlSecs")]
    pub ttl_secs: u64,
}

fn default_cache_capacity() -> usize {
    256
}
fn default_cache_ttl_secs() -> u64 {
    900
}

impl Default for ManagerCacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_cache_capacity(),
            ttl_secs: default_cache_ttl_secs(),
        }
    }
}

impl ManagerCacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}
