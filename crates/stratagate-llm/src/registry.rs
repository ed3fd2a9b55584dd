//! Provider lookup by canonical id or alias.
//!
//! The [`ProviderRegistry`] holds exactly one adapter per [`ProviderId`].
//! Alternate names ("chatgpt", "google", ...) are resolved to a canonical
//! id through the built-in alias table plus the configured extras; they are
//! never registered as adapters of their own.

use std::collections::HashMap;
use std::sync::Arc;

use stratagate_types::ProviderId;
use stratagate_types::config::GatewayConfig;

use crate::cohere::CohereProvider;
use crate::config::ProviderSpec;
use crate::gemini::GeminiProvider;
use crate::keys::KeyResolver;
use crate::openai_compat::ChatCompletionProvider;
use crate::provider::Provider;

/// Adapters keyed by canonical provider id.
pub struct ProviderRegistry {
    providers: HashMap<ProviderId, Arc<dyn Provider>>,
    aliases: HashMap<String, String>,
}

impl ProviderRegistry {
    /// An empty registry using `aliases` on top of the built-in table.
    pub fn new(aliases: HashMap<String, String>) -> Self {
        Self {
            providers: HashMap::new(),
            aliases,
        }
    }

    /// Build all six backends from `config`, resolving keys through `keys`.
    pub fn from_config(config: &GatewayConfig, keys: Arc<dyn KeyResolver>) -> Self {
        let mut registry = Self::new(config.aliases.clone());
        for id in ProviderId::ALL {
            let spec = ProviderSpec::from_config(id, config);
            let provider: Arc<dyn Provider> = match id {
                ProviderId::Gemini => Arc::new(GeminiProvider::new(spec, keys.clone())),
                ProviderId::Cohere => Arc::new(CohereProvider::new(spec, keys.clone())),
                ProviderId::OpenAi
                | ProviderId::DeepSeek
                | ProviderId::Groq
                | ProviderId::OpenRouter => {
                    Arc::new(ChatCompletionProvider::new(spec, keys.clone()))
                }
            };
            registry.register(provider);
        }
        registry
    }

    /// Register `provider` under its own id, replacing any previous adapter.
    pub fn register(&mut self, provider: Arc<dyn Provider>) {
        self.providers.insert(provider.id(), provider);
    }

    pub fn get(&self, id: ProviderId) -> Option<Arc<dyn Provider>> {
        self.providers.get(&id).cloned()
    }

    /// Normalise `name` with the configured aliases, then the built-ins.
    pub fn resolve(&self, name: &str) -> Option<ProviderId> {
        ProviderId::normalize_with(name, &self.aliases)
    }

    /// Look up an adapter by any accepted name.
    pub fn get_by_name(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.resolve(name).and_then(|id| self.get(id))
    }

    /// Registered ids in canonical order.
    pub fn ids(&self) -> Vec<ProviderId> {
        let mut ids: Vec<ProviderId> = self.providers.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.ids())
            .field("aliases", &self.aliases)
            .finish()
    }
}
