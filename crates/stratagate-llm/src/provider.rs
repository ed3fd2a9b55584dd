//! The core [`Provider`] trait for text generation.
//!
//! Every backend adapter implements this trait. The manager only ever sees
//! `Arc<dyn Provider>` and the uniform [`ProviderResult`] it returns.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use stratagate_types::secret::SecretString;
use stratagate_types::{
    GenerationConfig, ProviderAttempt, ProviderId, ProviderResult, RequestMetadata,
};

use crate::error::ProviderError;
use crate::keys::validate_api_key;

/// Per-call context threaded from the manager into adapters.
///
/// Caller identity drives key resolution, so adapters are shared between
/// callers and never hold the "current caller" themselves.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    /// Identity of the caller, if any.
    pub caller_id: Option<String>,
    /// Cancels backoff sleeps, rate-limit waits and in-flight requests.
    pub cancel: CancellationToken,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// A context for the given caller.
    pub fn for_caller(caller_id: impl Into<String>) -> Self {
        Self {
            caller_id: Some(caller_id.into()),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn caller(&self) -> Option<&str> {
        self.caller_id.as_deref()
    }
}

/// A single generation request as seen by an adapter.
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    /// The user prompt.
    pub prompt: String,
    /// Sampling settings.
    pub config: GenerationConfig,
    /// Optional overrides (system prompt, response format, extra payload).
    pub metadata: RequestMetadata,
}

impl GenerateRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    pub fn with_config(mut self, config: GenerationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_metadata(mut self, metadata: RequestMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// The system prompt to send: the metadata override, or `default`.
    pub fn system_prompt<'a>(&'a self, default: &'a str) -> &'a str {
        self.metadata
            .system_prompt
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(default)
    }
}

/// Text extracted from one successful provider call.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    /// Generated text (never blank).
    pub text: String,
    /// Model that produced it.
    pub model: String,
    /// Tokens reported by the provider.
    pub tokens_used: Option<u32>,
    /// The untouched response body.
    pub raw: serde_json::Value,
}

/// Whether a provider can be called right now, and if not, why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    /// A plausible key is available.
    Available,
    /// No key could be resolved.
    MissingKey,
    /// A key was found but fails the validity heuristic.
    MalformedKey(String),
}

impl Availability {
    pub fn is_available(&self) -> bool {
        matches!(self, Availability::Available)
    }

    /// Human-readable reason for unavailability, recorded on skipped attempts.
    pub fn reason(&self, provider: ProviderId) -> Option<String> {
        match self {
            Availability::Available => None,
            Availability::MissingKey => Some(format!(
                "{} API key is not configured (set {})",
                provider.display_name(),
                provider.env_key()
            )),
            Availability::MalformedKey(why) => Some(format!(
                "{} API key looks invalid: {why}",
                provider.display_name()
            )),
        }
    }
}

/// A text-completion backend.
///
/// Implementations own their retry policy and key lookup. `generate` never
/// fails with an error: every failure is reported inside the returned
/// [`ProviderResult`], with one attempt per call made.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Canonical id of this backend.
    fn id(&self) -> ProviderId;

    /// The model requests are sent to by default.
    fn model(&self) -> &str;

    /// Resolve the API key for the caller in `ctx`.
    fn api_key(&self, ctx: &CallContext) -> Option<SecretString>;

    /// Check the resolved key without touching the network.
    fn availability(&self, ctx: &CallContext) -> Availability {
        match self.api_key(ctx) {
            Some(key) => validate_api_key(self.id(), key.expose()),
            None => Availability::MissingKey,
        }
    }

    fn is_available(&self, ctx: &CallContext) -> bool {
        self.availability(ctx).is_available()
    }

    /// Generate text for `request`.
    async fn generate(&self, request: &GenerateRequest, ctx: &CallContext) -> ProviderResult;
}

/// Result for an adapter called with no key at all.
pub(crate) fn missing_key_result(id: ProviderId) -> ProviderResult {
    let err = ProviderError::MissingApiKey(format!("set {}", id.env_key()));
    ProviderResult::failed(Some(id), err.to_string())
        .with_attempts(vec![ProviderAttempt::failure(id, err.to_string())])
}
