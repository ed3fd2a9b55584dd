//! API key resolution and validation.
//!
//! Key storage lives outside the gateway. Adapters ask an injected
//! [`KeyResolver`] for the key of the current caller, then run it through
//! [`validate_api_key`] before spending a network call on it.

use std::collections::HashMap;
use std::sync::Arc;

use stratagate_types::ProviderId;
use stratagate_types::config::ProvidersConfig;
use stratagate_types::secret::SecretString;

use crate::provider::Availability;

/// Substrings that mark a key as a copy-pasted placeholder.
const PLACEHOLDER_MARKERS: &[&str] = &[
    "your-",
    "your_",
    "dummy",
    "test-",
    "example",
    "xxxxx",
    "placeholder",
    "changeme",
    "insert",
];

/// Looks up the API key for a provider on behalf of a caller.
pub trait KeyResolver: Send + Sync {
    /// Return the key, or `None` when this resolver has nothing for the pair.
    fn resolve(&self, provider: ProviderId, caller_id: Option<&str>) -> Option<SecretString>;
}

/// Reads keys from each provider's environment variable.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvKeyResolver;

impl KeyResolver for EnvKeyResolver {
    fn resolve(&self, provider: ProviderId, _caller_id: Option<&str>) -> Option<SecretString> {
        std::env::var(provider.env_key())
            .ok()
            .map(SecretString::from)
            .filter(|k| !k.is_blank())
    }
}

/// Fixed keys, typically taken from the config file.
#[derive(Debug, Clone, Default)]
pub struct StaticKeyResolver {
    keys: HashMap<ProviderId, SecretString>,
}

impl StaticKeyResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect every non-blank key from the providers section.
    pub fn from_config(providers: &ProvidersConfig) -> Self {
        let keys = ProviderId::ALL
            .into_iter()
            .filter_map(|id| {
                let key = &providers.get(id).api_key;
                (!key.is_blank()).then(|| (id, key.clone()))
            })
            .collect();
        Self { keys }
    }

    pub fn with_key(mut self, provider: ProviderId, key: impl Into<SecretString>) -> Self {
        self.keys.insert(provider, key.into());
        self
    }
}

impl KeyResolver for StaticKeyResolver {
    fn resolve(&self, provider: ProviderId, _caller_id: Option<&str>) -> Option<SecretString> {
        self.keys.get(&provider).cloned()
    }
}

/// Adapts a closure `(provider, caller_id) -> Option<SecretString>`.
///
/// This is the hook for caller-scoped key stores.
pub struct FnKeyResolver<F>(pub F);

impl<F> KeyResolver for FnKeyResolver<F>
where
    F: Fn(ProviderId, Option<&str>) -> Option<SecretString> + Send + Sync,
{
    fn resolve(&self, provider: ProviderId, caller_id: Option<&str>) -> Option<SecretString> {
        (self.0)(provider, caller_id)
    }
}

/// Tries each resolver in order; the first non-blank key wins.
#[derive(Clone, Default)]
pub struct ChainKeyResolver {
    resolvers: Vec<Arc<dyn KeyResolver>>,
}

impl ChainKeyResolver {
    pub fn new(resolvers: Vec<Arc<dyn KeyResolver>>) -> Self {
        Self { resolvers }
    }

    pub fn push(mut self, resolver: Arc<dyn KeyResolver>) -> Self {
        self.resolvers.push(resolver);
        self
    }
}

impl KeyResolver for ChainKeyResolver {
    fn resolve(&self, provider: ProviderId, caller_id: Option<&str>) -> Option<SecretString> {
        self.resolvers
            .iter()
            .filter_map(|r| r.resolve(provider, caller_id))
            .find(|k| !k.is_blank())
    }
}

/// Config keys first, then environment variables.
pub fn default_key_resolver(providers: &ProvidersConfig) -> Arc<dyn KeyResolver> {
    Arc::new(ChainKeyResolver::new(vec![
        Arc::new(StaticKeyResolver::from_config(providers)),
        Arc::new(EnvKeyResolver),
    ]))
}

/// Shape constraints for one provider's keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyRule {
    /// Minimum key length in characters.
    pub min_len: usize,
    /// Required prefix, if the provider issues keys with one.
    pub prefix: Option<&'static str>,
}

impl KeyRule {
    pub fn for_provider(provider: ProviderId) -> Self {
        match provider {
            ProviderId::OpenAi | ProviderId::DeepSeek => KeyRule {
                min_len: 20,
                prefix: Some("sk-"),
            },
            ProviderId::Groq => KeyRule {
                min_len: 20,
                prefix: Some("gsk_"),
            },
            ProviderId::OpenRouter => KeyRule {
                min_len: 20,
                prefix: Some("sk-or-"),
            },
            ProviderId::Gemini => KeyRule {
                min_len: 30,
                prefix: Some("AIza"),
            },
            ProviderId::Cohere => KeyRule {
                min_len: 20,
                prefix: None,
            },
        }
    }
}

/// Heuristic key check; never touches the network.
pub fn validate_api_key(provider: ProviderId, key: &str) -> Availability {
    let key = key.trim();
    if key.is_empty() {
        return Availability::MissingKey;
    }

    let lower = key.to_lowercase();
    if let Some(marker) = PLACEHOLDER_MARKERS.iter().find(|m| lower.contains(*m)) {
        return Availability::MalformedKey(format!("contains placeholder text '{marker}'"));
    }

    let rule = KeyRule::for_provider(provider);
    if let Some(prefix) = rule.prefix
        && !key.starts_with(prefix)
    {
        return Availability::MalformedKey(format!("expected prefix '{prefix}'"));
    }
    if key.chars().count() < rule.min_len {
        return Availability::MalformedKey(format!(
            "shorter than {} characters",
            rule.min_len
        ));
    }

    Availability::Available
}
