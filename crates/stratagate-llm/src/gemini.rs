//! Google Gemini adapter with model fallback.
//!
//! [`GeminiProvider`] works against a [`GenerativeClient`], the in-process
//! client seam; [`GeminiRestClient`] is the reqwest-backed implementation
//! of it. Gemini retires model names regularly, so the adapter walks an
//! ordered queue of candidate models. A "model not found" answer moves on
//! to the next candidate and, once per call, asks the API which models
//! exist. Any other failure ends the call.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use stratagate_types::secret::SecretString;
use stratagate_types::{ProviderAttempt, ProviderId, ProviderResult};

use crate::config::ProviderSpec;
use crate::error::{ProviderError, Result};
use crate::keys::KeyResolver;
use crate::provider::{CallContext, Completion, GenerateRequest, Provider, missing_key_result};

/// Sampling settings understood by `generateContent`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationSettings {
    pub temperature: f64,
    pub max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
}

/// The operations the Gemini adapter needs from a client.
#[async_trait]
pub trait GenerativeClient: Send + Sync {
    /// Generate content with `model`.
    async fn generate_content(
        &self,
        api_key: &str,
        model: &str,
        prompt: &str,
        system_instruction: Option<&str>,
        settings: &GenerationSettings,
    ) -> Result<Completion>;

    /// Names of models that support content generation, without the
    /// `models/` prefix.
    async fn list_models(&self, api_key: &str) -> Result<Vec<String>>;
}

// ── REST client ──────────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentBody<'a> {
    contents: Vec<Content<'a>>,
    generation_config: &'a GenerationSettings,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    model_version: Option<String>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    total_token_count: Option<u32>,
}

#[derive(Deserialize)]
struct ListModelsResponse {
    #[serde(default)]
    models: Vec<ModelEntry>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelEntry {
    name: String,
    #[serde(default)]
    supported_generation_methods: Vec<String>,
}

/// `generateContent` over the Generative Language REST API.
#[derive(Debug, Clone)]
pub struct GeminiRestClient {
    base_url: String,
    http: reqwest::Client,
}

impl GeminiRestClient {
    pub fn new(base_url: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        }
    }

    pub fn from_spec(spec: &ProviderSpec) -> Self {
        let http = reqwest::Client::builder()
            .timeout(spec.timeout)
            .build()
            .unwrap_or_default();
        Self::new(spec.api_base.clone(), http)
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let err = ProviderError::from_status(status.as_u16(), &body);
        // Gemini reports retired model names as 400 on some API versions.
        match err {
            ProviderError::BadRequest(msg) if is_model_not_found_message(&msg) => {
                Err(ProviderError::ModelNotFound(msg))
            }
            other => Err(other),
        }
    }
}

fn is_model_not_found_message(msg: &str) -> bool {
    let lower = msg.to_lowercase();
    lower.contains("model") && lower.contains("not found")
}

#[async_trait]
impl GenerativeClient for GeminiRestClient {
    async fn generate_content(
        &self,
        api_key: &str,
        model: &str,
        prompt: &str,
        system_instruction: Option<&str>,
        settings: &GenerationSettings,
    ) -> Result<Completion> {
        let url = format!("{}/models/{model}:generateContent", self.base_url);
        let body = GenerateContentBody {
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part { text: prompt }],
            }],
            generation_config: settings,
            system_instruction: system_instruction.map(|text| Content {
                role: None,
                parts: vec![Part { text }],
            }),
        };

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await?;
        let response = Self::check_status(response).await?;

        let raw: serde_json::Value = response.json().await.map_err(|e| {
            ProviderError::InvalidResponse(format!("failed to parse response: {e}"))
        })?;
        let parsed: GenerateContentResponse = serde_json::from_value(raw.clone())
            .map_err(|e| ProviderError::InvalidResponse(format!("unexpected response shape: {e}")))?;

        let text: String = parsed
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| {
                c.parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect()
            })
            .unwrap_or_default();
        if text.trim().is_empty() {
            return Err(ProviderError::EmptyResponse);
        }

        Ok(Completion {
            text,
            model: parsed.model_version.unwrap_or_else(|| model.to_string()),
            tokens_used: parsed.usage_metadata.and_then(|u| u.total_token_count),
            raw,
        })
    }

    async fn list_models(&self, api_key: &str) -> Result<Vec<String>> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .http
            .get(&url)
            .header("x-goog-api-key", api_key)
            .query(&[("pageSize", "1000")])
            .send()
            .await?;
        let response = Self::check_status(response).await?;
        let listing: ListModelsResponse = response.json().await.map_err(|e| {
            ProviderError::InvalidResponse(format!("failed to parse model list: {e}"))
        })?;

        Ok(listing
            .models
            .into_iter()
            .filter(|m| {
                m.supported_generation_methods
                    .iter()
                    .any(|method| method == "generateContent")
            })
            .map(|m| {
                m.name
                    .strip_prefix("models/")
                    .unwrap_or(&m.name)
                    .to_string()
            })
            .collect())
    }
}

// ── Provider ─────────────────────────────────────────────────────────────

/// Gemini adapter with an ordered model queue and one-time discovery.
pub struct GeminiProvider {
    spec: ProviderSpec,
    client: Arc<dyn GenerativeClient>,
    keys: Arc<dyn KeyResolver>,
}

impl GeminiProvider {
    /// An adapter backed by [`GeminiRestClient`].
    pub fn new(spec: ProviderSpec, keys: Arc<dyn KeyResolver>) -> Self {
        let client = Arc::new(GeminiRestClient::from_spec(&spec));
        Self::with_client(spec, client, keys)
    }

    pub fn with_client(
        spec: ProviderSpec,
        client: Arc<dyn GenerativeClient>,
        keys: Arc<dyn KeyResolver>,
    ) -> Self {
        Self { spec, client, keys }
    }

    /// Configured model followed by the fallback list, deduplicated.
    pub fn model_candidates(&self) -> Vec<String> {
        let mut queue: Vec<String> = Vec::new();
        for model in std::iter::once(&self.spec.model).chain(&self.spec.fallback_models) {
            let model = model.trim();
            if !model.is_empty() && !queue.iter().any(|m| m == model) {
                queue.push(model.to_string());
            }
        }
        queue
    }
}

#[async_trait]
impl Provider for GeminiProvider {
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

        let settings = GenerationSettings {
            temperature: request.config.temperature,
            max_output_tokens: request.config.max_output_tokens,
            response_mime_type: request.config.response_mime_type.clone(),
        };
        let system = request.metadata.system_prompt.as_deref();

        let mut queue = self.model_candidates();
        let mut attempts = Vec::new();
        let mut discovered = false;
        let mut last_err: Option<ProviderError> = None;
        let mut idx = 0;

        while idx < queue.len() {
            let model = queue[idx].clone();
            idx += 1;

            let started = Instant::now();
            let result = tokio::select! {
                biased;
                _ = ctx.cancel.cancelled() => Err(ProviderError::Cancelled),
                r = self.client.generate_content(key.expose(), &model, &request.prompt, system, &settings) => r,
            };
            let latency = started.elapsed().as_secs_f64() * 1000.0;

            match result {
                Ok(completion) => {
                    attempts.push(
                        ProviderAttempt::success(id)
                            .with_status(Some(200))
                            .with_latency(latency)
                            .with_tokens(completion.tokens_used),
                    );
                    if model != self.spec.model {
                        info!(
                            configured = %self.spec.model,
                            served_by = %model,
                            "gemini request served by fallback model"
                        );
                    }
                    return ProviderResult::ok(id, completion.text)
                        .with_model(model)
                        .with_status(Some(200))
                        .with_tokens(completion.tokens_used)
                        .with_raw(completion.raw)
                        .with_attempts(attempts);
                }
                Err(ProviderError::ModelNotFound(msg)) => {
                    warn!(model = %model, error = %msg, "gemini model not available");
                    let err = ProviderError::ModelNotFound(format!("{model}: {msg}"));
                    attempts.push(
                        ProviderAttempt::failure(id, err.to_string())
                            .with_status(err.status_code())
                            .with_latency(latency),
                    );
                    last_err = Some(err);

                    if !discovered {
                        discovered = true;
                        match self.client.list_models(key.expose()).await {
                            Ok(models) => {
                                let before = queue.len();
                                for m in models {
                                    if !queue.contains(&m) {
                                        queue.push(m);
                                    }
                                }
                                debug!(added = queue.len() - before, "gemini model discovery");
                            }
                            Err(e) => warn!(error = %e, "gemini model discovery failed"),
                        }
                    }
                }
                Err(err) => {
                    attempts.push(
                        ProviderAttempt::failure(id, err.to_string())
                            .with_status(err.status_code())
                            .with_latency(latency),
                    );
                    return ProviderResult::failed(Some(id), err.to_string())
                        .with_model(model)
                        .with_status(err.status_code())
                        .with_attempts(attempts);
                }
            }
        }

        let err = last_err.unwrap_or_else(|| {
            ProviderError::ModelNotFound("no Gemini model candidates configured".into())
        });
        ProviderResult::failed(Some(id), err.to_string())
            .with_status(err.status_code())
            .with_attempts(attempts)
    }
}

impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("model", &self.spec.model)
            .field("fallback_models", &self.spec.fallback_models)
            .finish()
    }
}
