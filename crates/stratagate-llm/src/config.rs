//! Per-adapter connection settings and built-in provider defaults.
//!
//! A [`ProviderSpec`] is resolved once at startup from the gateway config
//! and is read-only afterwards.

use std::time::Duration;

use stratagate_types::ProviderId;
use stratagate_types::config::GatewayConfig;

use crate::retry::RetryPolicy;

/// How one adapter talks to its backend.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSpec {
    /// Canonical provider id.
    pub id: ProviderId,
    /// Base URL of the API (no trailing slash needed).
    pub api_base: String,
    /// Default model.
    pub model: String,
    /// Extra model candidates, tried in order after `model`.
    pub fallback_models: Vec<String>,
    /// Retry policy for adapters that retry.
    pub retry: RetryPolicy,
    /// Per-request HTTP timeout.
    pub timeout: Duration,
}

impl ProviderSpec {
    /// Built-in defaults for `id`.
    pub fn builtin(id: ProviderId) -> Self {
        Self {
            id,
            api_base: default_api_base(id).to_string(),
            model: default_model(id).to_string(),
            fallback_models: default_fallback_models(id)
                .iter()
                .map(|m| m.to_string())
                .collect(),
            retry: RetryPolicy::default(),
            timeout: Duration::from_secs(120),
        }
    }

    /// Built-in defaults overlaid with the `providers.<id>` config section.
    pub fn from_config(id: ProviderId, config: &GatewayConfig) -> Self {
        let settings = config.providers.get(id);
        let mut spec = Self::builtin(id);

        if let Some(base) = settings.api_base.as_deref().filter(|b| !b.trim().is_empty()) {
            spec.api_base = base.trim().to_string();
        }
        if let Some(model) = settings.model.as_deref().filter(|m| !m.trim().is_empty()) {
            spec.model = model.trim().to_string();
        }
        if !settings.fallback_models.is_empty() {
            spec.fallback_models = settings.fallback_models.clone();
        }
        spec.retry = RetryPolicy::from_config(&config.retry);
        spec.timeout = config.http_timeout();
        spec
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_fallback_models(mut self, models: Vec<String>) -> Self {
        self.fallback_models = models;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// `api_base` joined with `path`.
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.api_base.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

pub fn default_api_base(id: ProviderId) -> &'static str {
    match id {
        ProviderId::OpenAi => "https://api.openai.com/v1",
        ProviderId::DeepSeek => "https://api.deepseek.com/v1",
        ProviderId::Groq => "https://api.groq.com/openai/v1",
        ProviderId::OpenRouter => "https://openrouter.ai/api/v1",
        ProviderId::Gemini => "https://generativelanguage.googleapis.com/v1beta",
        ProviderId::Cohere => "https://api.cohere.ai/v1",
    }
}

pub fn default_model(id: ProviderId) -> &'static str {
    match id {
        ProviderId::OpenAi => "gpt-4o-mini",
        ProviderId::DeepSeek => "deepseek-chat",
        ProviderId::Groq => "llama-3.3-70b-versatile",
        ProviderId::OpenRouter => "openai/gpt-4o-mini",
        ProviderId::Gemini => "gemini-2.0-flash",
        ProviderId::Cohere => "command",
    }
}

/// Gemini model names are retired often, so it ships with a fallback list.
pub fn default_fallback_models(id: ProviderId) -> &'static [&'static str] {
    match id {
        ProviderId::Gemini => &[
            "gemini-2.0-flash",
            "gemini-1.5-flash",
            "gemini-1.5-flash-latest",
            "gemini-1.5-pro",
        ],
        _ => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_defaults() {
        let spec = ProviderSpec::builtin(ProviderId::Groq);
        assert_eq!(spec.api_base, "https://api.groq.com/openai/v1");
        assert_eq!(spec.model, "llama-3.3-70b-versatile");
        assert!(spec.fallback_models.is_empty());
        assert_eq!(spec.retry.attempts, 5);

        let gemini = ProviderSpec::builtin(ProviderId::Gemini);
        assert!(!gemini.fallback_models.is_empty());
    }

    #[test]
    fn config_overrides_builtins() {
        let mut config = GatewayConfig::default();
        config.providers.openai.api_base = Some("http://localhost:8080/v1/".into());
        config.providers.openai.model = Some("gpt-4o".into());
        config.retry.attempts = 2;
        config.http_timeout_secs = 5;

        let spec = ProviderSpec::from_config(ProviderId::OpenAi, &config);
        assert_eq!(spec.model, "gpt-4o");
        assert_eq!(spec.url("/chat/completions"), "http://localhost:8080/v1/chat/completions");
        assert_eq!(spec.retry.attempts, 2);
        assert_eq!(spec.timeout, Duration::from_secs(5));
    }

    #[test]
    fn blank_overrides_are_ignored() {
        let mut config = GatewayConfig::default();
        config.providers.cohere.model = Some("  ".into());
        let spec = ProviderSpec::from_config(ProviderId::Cohere, &config);
        assert_eq!(spec.model, "command");
    }

    #[test]
    fn configured_fallbacks_replace_builtins() {
        let mut config = GatewayConfig::default();
        config.providers.gemini.fallback_models = vec!["gemini-exp".into()];
        let spec = ProviderSpec::from_config(ProviderId::Gemini, &config);
        assert_eq!(spec.fallback_models, vec!["gemini-exp"]);
    }
}
