//! OpenAI-compatible chat completion adapter.
//!
//! [`ChatCompletionProvider`] works with any API that follows the OpenAI
//! chat completion format. One instance per backend covers OpenAI,
//! DeepSeek, Groq and OpenRouter; only the [`ProviderSpec`] differs.
//!
//! Each call goes through [`run_with_retry`] with the spec's fixed backoff
//! schedule.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use stratagate_types::secret::SecretString;
use stratagate_types::{ProviderId, ProviderResult};

use crate::config::ProviderSpec;
use crate::error::{ProviderError, Result};
use crate::keys::KeyResolver;
use crate::provider::{CallContext, Completion, GenerateRequest, Provider, missing_key_result};
use crate::retry::run_with_retry;
use crate::types::{ChatMessage, ChatRequest, ChatResponse};

/// System prompt used when the request does not override it.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a precise analysis assistant. \
Respond with valid JSON only, without markdown fences or commentary.";

/// A provider that speaks the OpenAI chat completion protocol.
pub struct ChatCompletionProvider {
    spec: ProviderSpec,
    http: reqwest::Client,
    keys: Arc<dyn KeyResolver>,
}

impl ChatCompletionProvider {
    pub fn new(spec: ProviderSpec, keys: Arc<dyn KeyResolver>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(spec.timeout)
            .build()
            .unwrap_or_default();
        Self { spec, http, keys }
    }

    /// Use a caller-supplied HTTP client (shared pools, custom TLS).
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn spec(&self) -> &ProviderSpec {
        &self.spec
    }

    fn completions_url(&self) -> String {
        self.spec.url("chat/completions")
    }

    /// Build the request body for `request`.
    pub fn build_request(&self, request: &GenerateRequest) -> ChatRequest {
        let response_format = request.metadata.response_format.clone().or_else(|| {
            request
                .config
                .wants_json()
                .then(|| serde_json::json!({"type": "json_object"}))
        });
        ChatRequest {
            model: self.spec.model.clone(),
            messages: vec![
                ChatMessage::system(request.system_prompt(DEFAULT_SYSTEM_PROMPT)),
                ChatMessage::user(request.prompt.as_str()),
            ],
            temperature: request.config.temperature,
            max_tokens: request.config.max_output_tokens,
            response_format,
            extra: request.metadata.extra_payload.clone(),
        }
    }

    /// One HTTP call, classified into a [`Completion`] or a [`ProviderError`].
    async fn send_once(&self, api_key: &str, body: &ChatRequest) -> Result<Completion> {
        debug!(
            provider = %self.spec.id,
            model = %body.model,
            "sending chat completion request"
        );

        let payload = body.to_body()?;
        let response = self
            .http
            .post(self.completions_url())
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let err = ProviderError::from_status(status.as_u16(), &text);
            warn!(
                provider = %self.spec.id,
                status = status.as_u16(),
                error = %err,
                "chat completion request failed"
            );
            return Err(err);
        }

        let raw: serde_json::Value = response.json().await.map_err(|e| {
            ProviderError::InvalidResponse(format!("failed to parse response: {e}"))
        })?;
        let parsed: ChatResponse = serde_json::from_value(raw.clone()).map_err(|e| {
            ProviderError::InvalidResponse(format!("unexpected response shape: {e}"))
        })?;

        let text = parsed
            .first_content()
            .ok_or(ProviderError::EmptyResponse)?
            .to_string();

        Ok(Completion {
            text,
            model: parsed.model.clone().unwrap_or_else(|| body.model.clone()),
            tokens_used: parsed.usage.as_ref().and_then(|u| u.total_tokens),
            raw,
        })
    }
}

#[async_trait]
impl Provider for ChatCompletionProvider {
    fn id(&self) -> ProviderId {
        self.spec.id
    }

    fn model(&self) -> &str {
        &self.spec.model
    }

    fn api_key(&self, ctx: &CallContext) -> Option<SecretString> {
        self.keys.resolve(self.spec.id, ctx.caller())
    }

    async fn generate(&self, request: &GenerateRequest, ctx: &CallContext) -> ProviderResult {
        let id = self.spec.id;
        let Some(key) = self.api_key(ctx).filter(|k| !k.is_blank()) else {
            return missing_key_result(id);
        };

        let body = self.build_request(request);
        let api_key = key.expose();
        let body_ref = &body;

        run_with_retry(&self.spec.retry, id, &ctx.cancel, move |_attempt| {
            self.send_once(api_key, body_ref)
        })
        .await
        .into_result(id)
    }
}

impl std::fmt::Debug for ChatCompletionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCompletionProvider")
            .field("id", &self.spec.id)
            .field("api_base", &self.spec.api_base)
            .field("model", &self.spec.model)
            .finish()
    }
}
