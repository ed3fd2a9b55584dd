//! Priority-ordered provider fallback.
//!
//! [`ProviderManager::generate`] walks the priority list, skipping
//! providers that are unregistered or have no usable key, waits for
//! rate-limit capacity, calls the adapter and returns the first result that
//! carries text. Every attempt along the way (real or synthetic) ends up in
//! the returned [`ProviderResult`]. The manager never returns an error:
//! exhausting the list yields a failed result with a user-facing message.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use futures_util::FutureExt;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use stratagate_types::config::GatewayConfig;
use stratagate_types::{
    GenerationConfig, ProviderAttempt, ProviderId, ProviderResult, RequestMetadata,
};

use crate::error::ProviderError;
use crate::provider::{CallContext, GenerateRequest};
use crate::rate_limiter::RateLimiter;
use crate::registry::ProviderRegistry;
use crate::tokens::{TokenMonitor, estimate_tokens};

/// Returned when the first attempt was rate limited.
pub const RATE_LIMITED_MESSAGE: &str =
    "All AI providers are currently rate limited. Please try again in a minute.";

/// Returned when the first attempt was rejected with 401.
pub const INVALID_KEY_MESSAGE: &str =
    "The AI provider rejected the API key. Please check your API key configuration.";

/// Returned when no provider could even be tried.
pub const NO_PROVIDER_MESSAGE: &str =
    "No AI provider is configured. Please add an API key for at least one provider.";

/// Which providers a manager tries, and in what order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PriorityPolicy {
    /// Try these names (ids or aliases) in order.
    Ordered(Vec<String>),
    /// Only ever try this one provider.
    Pinned(String),
}

impl PriorityPolicy {
    pub fn from_config(config: &GatewayConfig) -> Self {
        match &config.pinned_provider {
            Some(name) => PriorityPolicy::Pinned(name.clone()),
            None => PriorityPolicy::Ordered(config.priority.clone()),
        }
    }
}

impl Default for PriorityPolicy {
    fn default() -> Self {
        let names = ProviderId::ALL.iter().map(|id| id.as_str().to_string());
        PriorityPolicy::Ordered(names.collect())
    }
}

/// Routes one caller's prompts across the registered providers.
///
/// Managers are cheap: the registry, rate limiter and token monitor are
/// shared with every other manager built from the same gateway.
pub struct ProviderManager {
    registry: Arc<ProviderRegistry>,
    limiter: Arc<RateLimiter>,
    monitor: Arc<TokenMonitor>,
    policy: PriorityPolicy,
    acquire_timeout: Duration,
    caller: RwLock<Option<String>>,
}

impl ProviderManager {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        limiter: Arc<RateLimiter>,
        monitor: Arc<TokenMonitor>,
        policy: PriorityPolicy,
    ) -> Self {
        Self {
            registry,
            limiter,
            monitor,
            policy,
            acquire_timeout: Duration::from_secs(60),
            caller: RwLock::new(None),
        }
    }

    /// How long to wait for rate-limit capacity before skipping a provider.
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Set the caller whose keys are used from the next request on.
    pub fn set_caller(&self, caller_id: Option<String>) {
        *self.caller.write().unwrap_or_else(PoisonError::into_inner) = caller_id;
    }

    pub fn caller(&self) -> Option<String> {
        self.caller
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn policy(&self) -> &PriorityPolicy {
        &self.policy
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    fn context(&self, cancel: &CancellationToken) -> CallContext {
        CallContext {
            caller_id: self.caller(),
            cancel: cancel.clone(),
        }
    }

    /// Canonical ids to try, normalised and deduplicated in order.
    ///
    /// Names that resolve to no known provider are dropped.
    pub fn priority_list(&self) -> Vec<ProviderId> {
        let names: &[String] = match &self.policy {
            PriorityPolicy::Ordered(names) => names,
            PriorityPolicy::Pinned(name) => std::slice::from_ref(name),
        };

        let mut ids = Vec::with_capacity(names.len());
        for name in names {
            match self.registry.resolve(name) {
                Some(id) if !ids.contains(&id) => ids.push(id),
                Some(_) => {}
                None => warn!(name = %name, "ignoring unknown provider in priority list"),
            }
        }
        ids
    }

    /// Whether any provider in the priority list has a usable key for the
    /// current caller.
    pub fn has_available_provider(&self) -> bool {
        let ctx = self.context(&CancellationToken::new());
        self.priority_list().into_iter().any(|id| {
            self.registry
                .get(id)
                .is_some_and(|provider| provider.is_available(&ctx))
        })
    }

    pub async fn generate(
        &self,
        prompt: &str,
        config: &GenerationConfig,
        metadata: Option<&RequestMetadata>,
    ) -> ProviderResult {
        self.generate_with_cancel(prompt, config, metadata, &CancellationToken::new())
            .await
    }

    /// Generate text, giving up early when `cancel` fires.
    ///
    /// A cancelled run fails with `"AI generation failed: request cancelled"`.
    /// Providers that were never called get no attempt record.
    pub async fn generate_with_cancel(
        &self,
        prompt: &str,
        config: &GenerationConfig,
        metadata: Option<&RequestMetadata>,
        cancel: &CancellationToken,
    ) -> ProviderResult {
        let request_id = Uuid::new_v4();
        let ctx = self.context(cancel);
        let request = GenerateRequest::new(prompt)
            .with_config(config.clone())
            .with_metadata(metadata.cloned().unwrap_or_default());
        let estimated = estimate_tokens(prompt);

        let mut attempts: Vec<ProviderAttempt> = Vec::new();
        let mut called_any = false;
        let mut cancelled = false;

        for id in self.priority_list() {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            let Some(provider) = self.registry.get(id) else {
                debug!(%request_id, provider = %id, "provider not registered, skipping");
                continue;
            };

            if let Some(reason) = provider.availability(&ctx).reason(id) {
                debug!(%request_id, provider = %id, reason = %reason, "provider unavailable");
                attempts.push(ProviderAttempt::failure(id, reason));
                continue;
            }

            match self
                .limiter
                .acquire_with_cancel(estimated, self.acquire_timeout, cancel)
                .await
            {
                Ok(true) => {}
                Ok(false) => {
                    warn!(%request_id, provider = %id, estimated, "rate limit wait timed out");
                    called_any = true;
                    attempts.push(
                        ProviderAttempt::failure(id, "timed out waiting for rate limit capacity")
                            .with_status(Some(429)),
                    );
                    continue;
                }
                Err(_) => {
                    cancelled = true;
                    break;
                }
            }

            called_any = true;
            debug!(%request_id, provider = %id, model = provider.model(), "calling provider");
            let started = Instant::now();
            let mut result = match AssertUnwindSafe(provider.generate(&request, &ctx))
                .catch_unwind()
                .await
            {
                Ok(result) => result,
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    warn!(%request_id, provider = %id, panic = %message, "provider panicked");
                    ProviderResult::failed(Some(id), format!("internal provider error: {message}"))
                }
            };
            let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

            let own = std::mem::take(&mut result.attempts);
            if own.is_empty() {
                attempts.push(synthesize_attempt(id, &result, latency_ms));
            } else {
                attempts.extend(own);
            }

            if result.success && result.has_text() {
                let caller = ctx.caller();
                let usage = self.monitor.log_request(
                    prompt,
                    &result.text,
                    result.tokens_used,
                    id,
                    caller,
                );
                self.limiter.record_tokens(usage.total_tokens);
                info!(
                    %request_id,
                    provider = %id,
                    tokens = usage.total_tokens,
                    attempts = attempts.len(),
                    latency_ms = latency_ms as u64,
                    "generation succeeded"
                );
                result.provider = Some(id);
                result.attempts = attempts;
                return result;
            }

            warn!(
                %request_id,
                provider = %id,
                status = ?result.status_code,
                error = result.error.as_deref().unwrap_or("empty response"),
                "provider failed, trying next"
            );

            if result.status_code == Some(429)
                && self.limiter.handle_429_error_with_cancel(cancel).await.is_err()
            {
                attempts.push(cancelled_attempt(id));
                cancelled = true;
                break;
            }
        }

        let message = exhaustion_message(&attempts, called_any, cancelled);
        warn!(%request_id, attempts = attempts.len(), error = %message, "all providers failed");
        let status = attempts.first().and_then(|a| a.status_code);
        ProviderResult::failed(None, message)
            .with_status(status)
            .with_attempts(attempts)
    }
}

impl std::fmt::Debug for ProviderManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderManager")
            .field("policy", &self.policy)
            .field("caller", &self.caller())
            .field("acquire_timeout", &self.acquire_timeout)
            .finish()
    }
}

fn cancelled_attempt(id: ProviderId) -> ProviderAttempt {
    ProviderAttempt::failure(id, ProviderError::Cancelled.to_string())
}

/// One attempt describing a result whose adapter reported none.
fn synthesize_attempt(id: ProviderId, result: &ProviderResult, latency_ms: f64) -> ProviderAttempt {
    let attempt = if result.success && result.has_text() {
        ProviderAttempt::success(id)
    } else {
        let error = result
            .error
            .clone()
            .unwrap_or_else(|| ProviderError::EmptyResponse.to_string());
        ProviderAttempt::failure(id, error)
    };
    attempt
        .with_status(result.status_code)
        .with_latency(latency_ms)
        .with_tokens(result.tokens_used)
}

/// User-facing error once every provider has failed.
///
/// Cancellation wins. Otherwise the first recorded attempt decides the
/// message: rate limiting and bad keys get dedicated wording, anything else
/// wraps the last error seen.
fn exhaustion_message(attempts: &[ProviderAttempt], called_any: bool, cancelled: bool) -> String {
    if cancelled {
        return format!("AI generation failed: {}", ProviderError::Cancelled);
    }
    if !called_any {
        return NO_PROVIDER_MESSAGE.to_string();
    }
    match attempts.first().and_then(|a| a.status_code) {
        Some(429) => RATE_LIMITED_MESSAGE.to_string(),
        Some(401) => INVALID_KEY_MESSAGE.to_string(),
        _ => {
            let last = attempts
                .iter()
                .rev()
                .find_map(|a| a.error.as_deref())
                .unwrap_or("unknown error");
            format!("AI generation failed: {last}")
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use stratagate_types::secret::SecretString;

    use crate::provider::{Availability, Provider};

    enum Step {
        Reply(ProviderResult),
        Panic,
        /// Cancel the caller's token mid-call, then fail.
        Cancel,
    }

    struct MockProvider {
        id: ProviderId,
        available: bool,
        steps: Mutex<VecDeque<Step>>,
        calls: AtomicU32,
        seen_callers: Mutex<Vec<Option<String>>>,
    }

    impl MockProvider {
        fn new(id: ProviderId, steps: Vec<Step>) -> Arc<Self> {
            Arc::new(Self {
                id,
                available: true,
                steps: Mutex::new(steps.into()),
                calls: AtomicU32::new(0),
                seen_callers: Mutex::new(Vec::new()),
            })
        }

        fn unavailable(id: ProviderId) -> Arc<Self> {
            Arc::new(Self {
                id,
                available: false,
                steps: Mutex::new(VecDeque::new()),
                calls: AtomicU32::new(0),
                seen_callers: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Provider for MockProvider {
        fn id(&self) -> ProviderId {
            self.id
        }

        fn model(&self) -> &str {
            "mock-model"
        }

        fn api_key(&self, _ctx: &CallContext) -> Option<SecretString> {
            self.available.then(|| SecretString::new("mock"))
        }

        fn availability(&self, _ctx: &CallContext) -> Availability {
            if self.available {
                Availability::Available
            } else {
                Availability::MissingKey
            }
        }

        async fn generate(&self, _request: &GenerateRequest, ctx: &CallContext) -> ProviderResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen_callers
                .lock()
                .unwrap()
                .push(ctx.caller().map(str::to_string));
            let step = self.steps.lock().unwrap().pop_front();
            match step {
                Some(Step::Reply(result)) => result,
                Some(Step::Panic) => panic!("adapter bug"),
                Some(Step::Cancel) => {
                    ctx.cancel.cancel();
                    ProviderResult::failed(Some(self.id), "request cancelled").with_attempts(vec![
                        ProviderAttempt::failure(self.id, "request cancelled"),
                    ])
                }
                None => ProviderResult::failed(Some(self.id), "script exhausted"),
            }
        }
    }

    fn ok(id: ProviderId, text: &str) -> Step {
        Step::Reply(
            ProviderResult::ok(id, text)
                .with_tokens(Some(42))
                .with_attempts(vec![ProviderAttempt::success(id).with_status(Some(200))]),
        )
    }

    fn failed(id: ProviderId, status: u16, error: &str) -> Step {
        Step::Reply(
            ProviderResult::failed(Some(id), error)
                .with_status(Some(status))
                .with_attempts(vec![
                    ProviderAttempt::failure(id, error).with_status(Some(status)),
                ]),
        )
    }

    fn manager_with(providers: Vec<Arc<MockProvider>>, policy: PriorityPolicy) -> ProviderManager {
        let mut registry = ProviderRegistry::new(HashMap::new());
        for provider in providers {
            registry.register(provider);
        }
        ProviderManager::new(
            Arc::new(registry),
            Arc::new(RateLimiter::new(90_000).with_backoff_base(Duration::from_millis(10))),
            Arc::new(TokenMonitor::new(90_000)),
            policy,
        )
        .with_acquire_timeout(Duration::from_secs(1))
    }

    fn ordered(names: &[&str]) -> PriorityPolicy {
        PriorityPolicy::Ordered(names.iter().map(|s| s.to_string()).collect())
    }

    async fn run(manager: &ProviderManager) -> ProviderResult {
        manager
            .generate("analyse this", &GenerationConfig::default(), None)
            .await
    }

    #[tokio::test]
    async fn first_success_wins() {
        let a = MockProvider::new(ProviderId::OpenAi, vec![ok(ProviderId::OpenAi, "A says hi")]);
        let b = MockProvider::new(ProviderId::Groq, vec![ok(ProviderId::Groq, "B")]);
        let manager = manager_with(vec![a.clone(), b.clone()], ordered(&["openai", "groq"]));

        let result = run(&manager).await;
        assert!(result.success);
        assert_eq!(result.text, "A says hi");
        assert_eq!(result.provider, Some(ProviderId::OpenAi));
        assert_eq!(a.calls(), 1);
        assert_eq!(b.calls(), 0);
        assert_eq!(result.attempts.len(), 1);
    }

    #[tokio::test]
    async fn falls_through_and_keeps_attempts_in_order() {
        let a = MockProvider::new(ProviderId::OpenAi, vec![failed(ProviderId::OpenAi, 500, "boom")]);
        let b = MockProvider::new(ProviderId::Gemini, vec![ok(ProviderId::Gemini, "from gemini")]);
        let manager = manager_with(vec![a, b], ordered(&["gpt", "google"]));

        let result = run(&manager).await;
        assert!(result.success);
        assert_eq!(result.text, "from gemini");
        let providers: Vec<_> = result.attempts.iter().map(|a| a.provider).collect();
        assert_eq!(providers, vec![ProviderId::OpenAi, ProviderId::Gemini]);
        assert!(!result.attempts[0].success);
        assert!(result.attempts[1].success);
    }

    #[tokio::test]
    async fn success_records_usage() {
        let a = MockProvider::new(ProviderId::OpenAi, vec![ok(ProviderId::OpenAi, "text")]);
        let manager = manager_with(vec![a], ordered(&["openai"]));

        run(&manager).await;
        assert_eq!(manager.limiter.get_current_usage().current_tpm, 42);
        assert_eq!(manager.monitor.total_tokens(), 42);
        assert_eq!(manager.monitor.request_count(), 1);
    }

    #[tokio::test]
    async fn success_without_text_is_a_failure() {
        let a = MockProvider::new(
            ProviderId::OpenAi,
            vec![Step::Reply(ProviderResult::ok(ProviderId::OpenAi, "  "))],
        );
        let b = MockProvider::new(ProviderId::Groq, vec![ok(ProviderId::Groq, "real")]);
        let manager = manager_with(vec![a, b], ordered(&["openai", "groq"]));

        let result = run(&manager).await;
        assert_eq!(result.text, "real");
        assert_eq!(result.attempts.len(), 2);
        assert_eq!(result.attempts[0].error.as_deref(), Some("Empty response content"));
    }

    #[tokio::test(start_paused = true)]
    async fn all_rate_limited_gives_rate_limit_message() {
        let a = MockProvider::new(ProviderId::OpenAi, vec![failed(ProviderId::OpenAi, 429, "slow down")]);
        let b = MockProvider::new(ProviderId::Groq, vec![failed(ProviderId::Groq, 429, "slow down")]);
        let manager = manager_with(vec![a, b], ordered(&["openai", "groq"]));

        let result = run(&manager).await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some(RATE_LIMITED_MESSAGE));
        assert_eq!(result.status_code, Some(429));
        assert_eq!(result.attempts.len(), 2);
    }

    #[tokio::test]
    async fn first_401_gives_invalid_key_message() {
        let a = MockProvider::new(ProviderId::OpenAi, vec![failed(ProviderId::OpenAi, 401, "bad key")]);
        let b = MockProvider::new(ProviderId::Groq, vec![failed(ProviderId::Groq, 500, "down")]);
        let manager = manager_with(vec![a, b], ordered(&["openai", "groq"]));

        let result = run(&manager).await;
        assert_eq!(result.error.as_deref(), Some(INVALID_KEY_MESSAGE));
    }

    #[tokio::test]
    async fn other_failures_wrap_the_last_error() {
        let a = MockProvider::new(ProviderId::OpenAi, vec![failed(ProviderId::OpenAi, 500, "down")]);
        let manager = manager_with(vec![a], ordered(&["openai"]));

        let result = run(&manager).await;
        assert_eq!(result.error.as_deref(), Some("AI generation failed: down"));
    }

    #[tokio::test]
    async fn unavailable_providers_get_synthetic_attempts() {
        let a = MockProvider::unavailable(ProviderId::OpenAi);
        let b = MockProvider::new(ProviderId::Cohere, vec![ok(ProviderId::Cohere, "cohere text")]);
        let manager = manager_with(vec![a.clone(), b], ordered(&["openai", "cohere"]));

        let result = run(&manager).await;
        assert!(result.success);
        assert_eq!(a.calls(), 0);
        assert_eq!(result.attempts.len(), 2);
        assert!(result.attempts[0].error.as_ref().unwrap().contains("OPENAI_API_KEY"));
    }

    #[tokio::test]
    async fn nothing_available_says_so() {
        let manager = manager_with(
            vec![MockProvider::unavailable(ProviderId::OpenAi)],
            ordered(&["openai", "gemini"]),
        );
        assert!(!manager.has_available_provider());

        let result = run(&manager).await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some(NO_PROVIDER_MESSAGE));
        // gemini is not registered, so only openai leaves a trace
        assert_eq!(result.attempts.len(), 1);
    }

    #[tokio::test]
    async fn panics_become_failed_attempts() {
        let a = MockProvider::new(ProviderId::OpenAi, vec![Step::Panic]);
        let b = MockProvider::new(ProviderId::Groq, vec![ok(ProviderId::Groq, "survived")]);
        let manager = manager_with(vec![a, b], ordered(&["openai", "groq"]));

        let result = run(&manager).await;
        assert!(result.success);
        assert_eq!(result.text, "survived");
        let first = result.attempts[0].error.as_deref().unwrap();
        assert!(first.contains("adapter bug"));
    }

    #[tokio::test]
    async fn pinned_policy_tries_only_the_pin() {
        let a = MockProvider::new(ProviderId::OpenAi, vec![failed(ProviderId::OpenAi, 500, "down")]);
        let b = MockProvider::new(ProviderId::Groq, vec![ok(ProviderId::Groq, "unused")]);
        let manager = manager_with(vec![a.clone(), b.clone()], PriorityPolicy::Pinned("chatgpt".into()));

        assert_eq!(manager.priority_list(), vec![ProviderId::OpenAi]);
        let result = run(&manager).await;
        assert!(!result.success);
        assert_eq!(a.calls(), 1);
        assert_eq!(b.calls(), 0);
    }

    #[test]
    fn priority_list_normalises_and_dedups() {
        let manager = manager_with(
            vec![],
            ordered(&["ChatGPT", "openai", "google", "nope", "Gemini", "cohere"]),
        );
        assert_eq!(
            manager.priority_list(),
            vec![ProviderId::OpenAi, ProviderId::Gemini, ProviderId::Cohere]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn acquire_timeout_records_429_attempt() {
        let a = MockProvider::new(ProviderId::OpenAi, vec![ok(ProviderId::OpenAi, "never")]);
        let mut registry = ProviderRegistry::new(HashMap::new());
        registry.register(a.clone());
        let manager = ProviderManager::new(
            Arc::new(registry),
            Arc::new(RateLimiter::new(1)),
            Arc::new(TokenMonitor::new(1)),
            ordered(&["openai"]),
        )
        .with_acquire_timeout(Duration::from_secs(2));

        let result = manager
            .generate(&"word ".repeat(100), &GenerationConfig::default(), None)
            .await;
        assert!(!result.success);
        assert_eq!(a.calls(), 0);
        assert_eq!(result.attempts[0].status_code, Some(429));
        assert_eq!(result.error.as_deref(), Some(RATE_LIMITED_MESSAGE));
    }

    #[tokio::test]
    async fn cancelled_before_start() {
        let a = MockProvider::new(ProviderId::OpenAi, vec![ok(ProviderId::OpenAi, "never")]);
        let manager = manager_with(vec![a.clone()], ordered(&["openai"]));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = manager
            .generate_with_cancel("x", &GenerationConfig::default(), None, &cancel)
            .await;
        assert!(!result.success);
        assert_eq!(a.calls(), 0);
        assert!(result.attempts.is_empty());
        assert_eq!(result.error.as_deref(), Some("AI generation failed: request cancelled"));
    }

    #[tokio::test]
    async fn cancellation_mid_run_skips_remaining_providers() {
        let a = MockProvider::new(ProviderId::OpenAi, vec![Step::Cancel]);
        let b = MockProvider::new(ProviderId::Groq, vec![ok(ProviderId::Groq, "never")]);
        let manager = manager_with(vec![a.clone(), b.clone()], ordered(&["openai", "groq"]));

        let result = manager
            .generate_with_cancel("x", &GenerationConfig::default(), None, &CancellationToken::new())
            .await;
        assert!(!result.success);
        assert_eq!(a.calls(), 1);
        assert_eq!(b.calls(), 0);
        let tried: Vec<_> = result.attempts.iter().map(|a| a.provider).collect();
        assert_eq!(tried, vec![ProviderId::OpenAi]);
        assert_eq!(result.error.as_deref(), Some("AI generation failed: request cancelled"));
    }

    #[tokio::test]
    async fn success_is_attributed_to_the_called_provider() {
        let mut anonymous = ProviderResult::ok(ProviderId::Cohere, "text");
        anonymous.provider = None;
        let a = MockProvider::new(ProviderId::Groq, vec![Step::Reply(anonymous)]);
        let manager = manager_with(vec![a], ordered(&["groq"]));

        let result = run(&manager).await;
        assert!(result.success);
        assert_eq!(result.provider, Some(ProviderId::Groq));
    }

    #[tokio::test]
    async fn caller_is_passed_to_adapters() {
        let a = MockProvider::new(
            ProviderId::OpenAi,
            vec![ok(ProviderId::OpenAi, "one"), ok(ProviderId::OpenAi, "two")],
        );
        let manager = manager_with(vec![a.clone()], ordered(&["openai"]));

        manager.set_caller(Some("user-1".into()));
        run(&manager).await;
        manager.set_caller(None);
        run(&manager).await;

        let seen = a.seen_callers.lock().unwrap().clone();
        assert_eq!(seen, vec![Some("user-1".to_string()), None]);
    }

    #[test]
    fn policy_from_config() {
        let mut config = GatewayConfig::default();
        assert_eq!(PriorityPolicy::from_config(&config), PriorityPolicy::default());
        config.pinned_provider = Some("groq".into());
        assert_eq!(
            PriorityPolicy::from_config(&config),
            PriorityPolicy::Pinned("groq".into())
        );
    }
}
