//! Provider identities and the caller-facing request/result types.
//!
//! This module contains:
//! - [`ProviderId`], the closed set of canonical backends, with alias
//!   normalisation ([`ProviderId::normalize`], [`ProviderId::normalize_with`])
//! - [`GenerationConfig`] and [`RequestMetadata`], the inputs to `generate`
//! - [`ProviderAttempt`] and [`ProviderResult`], its outputs

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GatewayError;

// ── Provider ids ─────────────────────────────────────────────────────────

/// Canonical identifier of a text-completion backend.
///
/// The registry stores exactly one adapter per variant. Alternate spellings
/// ("chatgpt", "google", ...) are names that normalise to a variant; they
/// are never registered as adapters of their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    /// OpenAI chat completions.
    #[serde(rename = "openai")]
    OpenAi,
    /// DeepSeek (OpenAI-compatible).
    #[serde(rename = "deepseek")]
    DeepSeek,
    /// Groq (OpenAI-compatible).
    Groq,
    /// OpenRouter gateway (OpenAI-compatible).
    #[serde(rename = "openrouter")]
    OpenRouter,
    /// Google Gemini, with model discovery fallback.
    Gemini,
    /// Cohere generate API (alternate schema).
    Cohere,
}

/// Built-in alias table. Keys are already folded (lowercase, `_` separators).
const BUILTIN_ALIASES: &[(&str, ProviderId)] = &[
    ("openai", ProviderId::OpenAi),
    ("open_ai", ProviderId::OpenAi),
    ("gpt", ProviderId::OpenAi),
    ("chatgpt", ProviderId::OpenAi),
    ("deepseek", ProviderId::DeepSeek),
    ("deep_seek", ProviderId::DeepSeek),
    ("deepseek_chat", ProviderId::DeepSeek),
    ("groq", ProviderId::Groq),
    ("groq_cloud", ProviderId::Groq),
    ("groqcloud", ProviderId::Groq),
    ("openrouter", ProviderId::OpenRouter),
    ("open_router", ProviderId::OpenRouter),
    ("gemini", ProviderId::Gemini),
    ("google", ProviderId::Gemini),
    ("google_ai", ProviderId::Gemini),
    ("gemini_pro", ProviderId::Gemini),
    ("bard", ProviderId::Gemini),
    ("cohere", ProviderId::Cohere),
    ("cohere_ai", ProviderId::Cohere),
    ("command", ProviderId::Cohere),
];

impl ProviderId {
    /// Every canonical provider, in default priority order.
    pub const ALL: [ProviderId; 6] = [
        ProviderId::OpenAi,
        ProviderId::DeepSeek,
        ProviderId::Groq,
        ProviderId::OpenRouter,
        ProviderId::Gemini,
        ProviderId::Cohere,
    ];

    /// The canonical string id (e.g. `"openai"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::OpenAi => "openai",
            ProviderId::DeepSeek => "deepseek",
            ProviderId::Groq => "groq",
            ProviderId::OpenRouter => "openrouter",
            ProviderId::Gemini => "gemini",
            ProviderId::Cohere => "cohere",
        }
    }

    /// Human-readable name for status output.
    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderId::OpenAi => "OpenAI",
            ProviderId::DeepSeek => "DeepSeek",
            ProviderId::Groq => "Groq",
            ProviderId::OpenRouter => "OpenRouter",
            ProviderId::Gemini => "Google Gemini",
            ProviderId::Cohere => "Cohere",
        }
    }

    /// Environment variable consulted for this provider's API key.
    pub fn env_key(&self) -> &'static str {
        match self {
            ProviderId::OpenAi => "OPENAI_API_KEY",
            ProviderId::DeepSeek => "DEEPSEEK_API_KEY",
            ProviderId::Groq => "GROQ_API_KEY",
            ProviderId::OpenRouter => "OPENROUTER_API_KEY",
            ProviderId::Gemini => "GEMINI_API_KEY",
            ProviderId::Cohere => "COHERE_API_KEY",
        }
    }

    /// Normalise a provider name using only the built-in aliases.
    ///
    /// Matching is case-insensitive and treats `-`, ` ` and `_` alike, so
    /// `"Open-AI"`, `"open ai"` and `"open_ai"` all resolve to
    /// [`ProviderId::OpenAi`].
    pub fn normalize(name: &str) -> Option<ProviderId> {
        let folded = fold(name);
        BUILTIN_ALIASES
            .iter()
            .find(|(alias, _)| *alias == folded)
            .map(|(_, id)| *id)
    }

    /// Normalise a provider name, consulting `extra` (alias -> canonical id)
    /// before the built-in table.
    pub fn normalize_with(name: &str, extra: &HashMap<String, String>) -> Option<ProviderId> {
        let folded = fold(name);
        extra
            .iter()
            .find(|(alias, _)| fold(alias) == folded)
            .and_then(|(_, target)| ProviderId::normalize(target))
            .or_else(|| ProviderId::normalize(&folded))
    }
}

/// Fold a name for alias comparison: trim, lowercase, unify separators.
fn fold(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == '-' || c == ' ' { '_' } else { c })
        .collect()
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProviderId::normalize(s).ok_or_else(|| GatewayError::UnknownProvider(s.to_string()))
    }
}

// ── Request inputs ───────────────────────────────────────────────────────

/// Sampling settings for a single `generate` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Maximum number of tokens the provider may generate.
    #[serde(default = "default_max_output_tokens", alias = "maxOutputTokens")]
    pub max_output_tokens: u32,

    /// Requested MIME type of the response (e.g. `"application/json"`).
    #[serde(default, alias = "responseMimeType")]
    pub response_mime_type: Option<String>,
}

fn default_temperature() -> f64 {
    0.7
}
fn default_max_output_tokens() -> u32 {
    4096
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            response_mime_type: None,
        }
    }
}

impl GenerationConfig {
    /// Whether the caller asked for a JSON response.
    pub fn wants_json(&self) -> bool {
        self.response_mime_type
            .as_deref()
            .is_some_and(|m| m.eq_ignore_ascii_case("application/json"))
    }
}

/// Optional per-request overrides passed through to adapters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestMetadata {
    /// Replaces the adapter's default system prompt.
    #[serde(default, alias = "systemPrompt")]
    pub system_prompt: Option<String>,

    /// Explicit `response_format` object for chat-completion payloads.
    #[serde(default, alias = "responseFormat")]
    pub response_format: Option<serde_json::Value>,

    /// Extra top-level fields merged into the request payload.
    #[serde(default, alias = "extraPayload")]
    pub extra_payload: serde_json::Map<String, serde_json::Value>,
}

// ── Attempts and results ─────────────────────────────────────────────────

/// The record of one concrete (or skipped) call to a provider.
///
/// Attempts are values: once built they are only ever appended to a
/// result's attempt list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderAttempt {
    /// Provider the attempt was made against.
    pub provider: ProviderId,
    /// Whether the call produced usable text.
    pub success: bool,
    /// Error description for failed attempts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// HTTP status (or synthetic status) of the call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// Wall-clock latency of the call in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<f64>,
    /// Tokens reported by the provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<u32>,
}

impl ProviderAttempt {
    /// A successful attempt.
    pub fn success(provider: ProviderId) -> Self {
        Self {
            provider,
            success: true,
            error: None,
            status_code: None,
            latency_ms: None,
            tokens_used: None,
        }
    }

    /// A failed attempt with an error description.
    pub fn failure(provider: ProviderId, error: impl Into<String>) -> Self {
        Self {
            provider,
            success: false,
            error: Some(error.into()),
            status_code: None,
            latency_ms: None,
            tokens_used: None,
        }
    }

    pub fn with_status(mut self, status: Option<u16>) -> Self {
        self.status_code = status;
        self
    }

    pub fn with_latency(mut self, latency_ms: f64) -> Self {
        self.latency_ms = Some(latency_ms);
        self
    }

    pub fn with_tokens(mut self, tokens: Option<u32>) -> Self {
        self.tokens_used = tokens;
        self
    }
}

/// The uniform outcome of a `generate` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderResult {
    /// Whether a provider produced usable text.
    pub success: bool,
    /// The generated text (empty on failure).
    pub text: String,
    /// Canonical id of the provider that served (or last failed) the request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderId>,
    /// Model that served the request, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Human-readable failure description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Status code of the final call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// Tokens reported by the provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<u32>,
    /// Provider response body, untouched.
    #[serde(default)]
    pub raw_response: serde_json::Value,
    /// Every attempt made while producing this result, in order.
    #[serde(default)]
    pub attempts: Vec<ProviderAttempt>,
}

impl ProviderResult {
    /// A successful result served by `provider`.
    pub fn ok(provider: ProviderId, text: impl Into<String>) -> Self {
        Self {
            success: true,
            text: text.into(),
            provider: Some(provider),
            model: None,
            error: None,
            status_code: None,
            tokens_used: None,
            raw_response: serde_json::Value::Null,
            attempts: Vec::new(),
        }
    }

    /// A failed result.
    pub fn failed(provider: Option<ProviderId>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            text: String::new(),
            provider,
            model: None,
            error: Some(error.into()),
            status_code: None,
            tokens_used: None,
            raw_response: serde_json::Value::Null,
            attempts: Vec::new(),
        }
    }

    pub fn with_status(mut self, status: Option<u16>) -> Self {
        self.status_code = status;
        self
    }

    pub fn with_tokens(mut self, tokens: Option<u32>) -> Self {
        self.tokens_used = tokens;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_raw(mut self, raw: serde_json::Value) -> Self {
        self.raw_response = raw;
        self
    }

    pub fn with_attempts(mut self, attempts: Vec<ProviderAttempt>) -> Self {
        self.attempts = attempts;
        self
    }

    /// `true` when the call succeeded and produced non-blank text.
    pub fn has_text(&self) -> bool {
        self.success && !self.text.trim().is_empty()
    }
}
