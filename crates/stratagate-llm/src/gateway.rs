//! The process-wide gateway context.
//!
//! A [`Gateway`] owns the shared pieces (rate limiter, token monitor,
//! chunker, provider registry) and hands out per-caller
//! [`ProviderManager`]s from a bounded cache. Build one at startup and pass
//! it around; nothing here lives in a global.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use stratagate_types::config::GatewayConfig;
use stratagate_types::{GenerationConfig, ProviderResult, RequestMetadata};

use crate::cache::ManagerCache;
use crate::chunker::TextChunker;
use crate::keys::{KeyResolver, default_key_resolver};
use crate::manager::{PriorityPolicy, ProviderManager};
use crate::rate_limiter::RateLimiter;
use crate::registry::ProviderRegistry;
use crate::tokens::TokenMonitor;

pub struct Gateway {
    config: GatewayConfig,
    limiter: Arc<RateLimiter>,
    monitor: Arc<TokenMonitor>,
    chunker: TextChunker,
    registry: Arc<ProviderRegistry>,
    managers: ManagerCache<ProviderManager>,
}

impl Gateway {
    /// Validate `config` and build a gateway that resolves keys from the
    /// config first, then the environment.
    pub fn from_config(config: &GatewayConfig) -> stratagate_types::Result<Self> {
        let keys = default_key_resolver(&config.providers);
        Self::with_resolver(config, keys)
    }

    /// Validate `config` and build a gateway with a caller-supplied key
    /// resolver.
    pub fn with_resolver(
        config: &GatewayConfig,
        keys: Arc<dyn KeyResolver>,
    ) -> stratagate_types::Result<Self> {
        config.validate()?;
        let registry = ProviderRegistry::from_config(config, keys);
        Ok(Self::with_registry(config, registry))
    }

    /// Build a gateway around an existing registry. The config is not
    /// validated.
    pub fn with_registry(config: &GatewayConfig, registry: ProviderRegistry) -> Self {
        info!(
            max_tpm = config.rate_limit.max_tpm,
            providers = registry.len(),
            "gateway initialised"
        );
        Self {
            limiter: Arc::new(RateLimiter::from_config(&config.rate_limit)),
            monitor: Arc::new(TokenMonitor::new(config.rate_limit.max_tpm)),
            chunker: TextChunker::from_config(&config.chunking),
            registry: Arc::new(registry),
            managers: ManagerCache::from_config(&config.manager_cache),
            config: config.clone(),
        }
    }

    /// The manager for `caller_id`, created on first use.
    pub fn manager(&self, caller_id: Option<&str>) -> Arc<ProviderManager> {
        let manager = self.managers.get_or_insert_with(caller_id, || {
            debug!(caller = ?caller_id, "creating provider manager");
            ProviderManager::new(
                self.registry.clone(),
                self.limiter.clone(),
                self.monitor.clone(),
                PriorityPolicy::from_config(&self.config),
            )
            .with_acquire_timeout(self.config.rate_limit.acquire_timeout())
        });
        manager.set_caller(caller_id.map(str::to_string));
        manager
    }

    pub async fn generate(
        &self,
        caller_id: Option<&str>,
        prompt: &str,
        config: &GenerationConfig,
        metadata: Option<&RequestMetadata>,
    ) -> ProviderResult {
        self.manager(caller_id)
            .generate(prompt, config, metadata)
            .await
    }

    /// Split `prompt` with the chunker and generate each chunk in order.
    ///
    /// Stops at the first chunk that fails; that failed result is the last
    /// element of the returned list.
    pub async fn generate_chunked(
        &self,
        caller_id: Option<&str>,
        prompt: &str,
        config: &GenerationConfig,
        metadata: Option<&RequestMetadata>,
        cancel: &CancellationToken,
    ) -> Vec<ProviderResult> {
        let chunks = self.chunker.chunk_text(prompt);
        let total = chunks.len();
        let manager = self.manager(caller_id);

        let mut results = Vec::with_capacity(total);
        for (index, chunk) in chunks.iter().enumerate() {
            debug!(chunk = index + 1, total, "generating chunk");
            let result = manager
                .generate_with_cancel(chunk, config, metadata, cancel)
                .await;
            let failed = !result.success;
            results.push(result);
            if failed {
                break;
            }
        }
        results
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn token_monitor(&self) -> &Arc<TokenMonitor> {
        &self.monitor
    }

    pub fn chunker(&self) -> &TextChunker {
        &self.chunker
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// Number of cached per-caller managers.
    pub fn cached_managers(&self) -> usize {
        self.managers.len()
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("registry", &self.registry)
            .field("limiter", &self.limiter)
            .field("managers", &self.managers)
            .finish()
    }
}
