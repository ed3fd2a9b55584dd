//! Cohere `generate` adapter.
//!
//! Cohere uses its own schema (`prompt` in, `generations[0].text` out) and
//! is called exactly once per request: there is no internal retry loop.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use stratagate_types::secret::SecretString;
use stratagate_types::{ProviderId, ProviderResult};

use crate::config::ProviderSpec;
use crate::error::{ProviderError, Result};
use crate::keys::KeyResolver;
use crate::provider::{CallContext, Completion, GenerateRequest, Provider, missing_key_result};
use crate::retry::{RetryPolicy, run_with_retry};

#[derive(Debug, Serialize)]
pub struct CohereRequest<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
    pub temperature: f64,
    pub max_tokens: u32,
    pub k: u32,
    pub return_likelihoods: &'static str,
}

#[derive(Debug, Deserialize)]
struct CohereResponse {
    #[serde(default)]
    generations: Vec<Generation>,
    #[serde(default)]
    meta: Option<Meta>,
}

#[derive(Debug, Deserialize)]
struct Generation {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Meta {
    #[serde(default)]
    tokens: Option<MetaTokens>,
    #[serde(default)]
    billed_units: Option<BilledUnits>,
}

#[derive(Debug, Deserialize)]
struct MetaTokens {
    #[serde(default)]
    output: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct BilledUnits {
    #[serde(default)]
    output_tokens: Option<u32>,
}

impl CohereResponse {
    fn output_tokens(&self) -> Option<u32> {
        let meta = self.meta.as_ref()?;
        meta.tokens
            .as_ref()
            .and_then(|t| t.output)
            .or_else(|| meta.billed_units.as_ref().and_then(|b| b.output_tokens))
    }
}

pub struct CohereProvider {
    spec: ProviderSpec,
    http: reqwest::Client,
    keys: Arc<dyn KeyResolver>,
}

impl CohereProvider {
    pub fn new(spec: ProviderSpec, keys: Arc<dyn KeyResolver>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(spec.timeout)
            .build()
            .unwrap_or_default();
        Self { spec, http, keys }
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    async fn send_once(&self, api_key: &str, request: &GenerateRequest) -> Result<Completion> {
        let body = CohereRequest {
            model: &self.spec.model,
            prompt: &request.prompt,
            temperature: request.config.temperature,
            max_tokens: request.config.max_output_tokens,
            k: 0,
            return_likelihoods: "NONE",
        };
        debug!(model = %self.spec.model, "sending cohere generate request");

        let response = self
            .http
            .post(self.spec.url("generate"))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let err = ProviderError::from_status(status.as_u16(), &text);
            warn!(status = status.as_u16(), error = %err, "cohere request failed");
            return Err(err);
        }

        let raw: serde_json::Value = response.json().await.map_err(|e| {
            ProviderError::InvalidResponse(format!("failed to parse response: {e}"))
        })?;
        let parsed: CohereResponse = serde_json::from_value(raw.clone())
            .map_err(|e| ProviderError::InvalidResponse(format!("unexpected response shape: {e}")))?;

        let text = parsed
            .generations
            .first()
            .and_then(|g| g.text.as_deref())
            .filter(|t| !t.trim().is_empty())
            .ok_or(ProviderError::EmptyResponse)?
            .to_string();

        Ok(Completion {
            text,
            model: self.spec.model.clone(),
            tokens_used: parsed.output_tokens(),
            raw,
        })
    }
}

#[async_trait]
impl Provider for CohereProvider {
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
        let api_key = key.expose();

        run_with_retry(&RetryPolicy::single(), id, &ctx.cancel, move |_attempt| {
            self.send_once(api_key, request)
        })
        .await
        .into_result(id)
    }
}

impl std::fmt::Debug for CohereProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CohereProvider")
            .field("api_base", &self.spec.api_base)
            .field("model", &self.spec.model)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_uses_cohere_field_names() {
        let body = CohereRequest {
            model: "command",
            prompt: "hello",
            temperature: 0.3,
            max_tokens: 50,
            k: 0,
            return_likelihoods: "NONE",
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["prompt"], "hello");
        assert_eq!(json["k"], 0);
        assert_eq!(json["return_likelihoods"], "NONE");
        assert!(json.get("messages").is_none());
    }

    #[test]
    fn output_tokens_prefers_meta_tokens() {
        let resp: CohereResponse = serde_json::from_value(serde_json::json!({
            "generations": [{"text": "hi"}],
            "meta": {"tokens": {"output": 9}, "billed_units": {"output_tokens": 11}}
        }))
        .unwrap();
        assert_eq!(resp.output_tokens(), Some(9));
    }

    #[test]
    fn output_tokens_falls_back_to_billed_units() {
        let resp: CohereResponse = serde_json::from_value(serde_json::json!({
            "generations": [{"text": "hi"}],
            "meta": {"billed_units": {"output_tokens": 11}}
        }))
        .unwrap();
        assert_eq!(resp.output_tokens(), Some(11));

        let resp: CohereResponse =
            serde_json::from_value(serde_json::json!({"generations": []})).unwrap();
        assert_eq!(resp.output_tokens(), None);
    }
}
