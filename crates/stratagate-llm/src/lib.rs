//! Multi-provider text generation gateway.
//!
//! This crate routes prompts to one of several interchangeable
//! text-completion backends, keeps the whole process under a
//! tokens-per-minute budget, retries transient failures and splits
//! oversized inputs into provider-sized chunks.
//!
//! # Architecture
//!
//! - [`Provider`] trait is the seam every backend adapter implements
//! - [`ChatCompletionProvider`] covers OpenAI, DeepSeek, Groq and OpenRouter
//! - [`GeminiProvider`] adds model discovery fallback; [`CohereProvider`]
//!   speaks Cohere's own schema
//! - [`ProviderRegistry`] holds one adapter per canonical [`ProviderId`]
//! - [`ProviderManager`] tries providers in priority order
//! - [`RateLimiter`], [`TokenMonitor`] and [`TextChunker`] are shared by
//!   every manager through the [`Gateway`] context
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use stratagate_llm::Gateway;
//! use stratagate_types::{GenerationConfig, config::GatewayConfig};
//!
//! let gateway = Gateway::from_config(&GatewayConfig::default())?;
//! let result = gateway
//!     .generate(Some("user-42"), "Summarise this report.", &GenerationConfig::default(), None)
//!     .await;
//! if result.success {
//!     println!("{}", result.text);
//! } else {
//!     eprintln!("{}", result.error.unwrap_or_default());
//! }
//! ```
//!
//! [`ProviderId`]: stratagate_types::ProviderId

pub mod cache;
pub mod chunker;
pub mod cohere;
pub mod config;
pub mod error;
pub mod gateway;
pub mod gemini;
pub mod keys;
pub mod manager;
pub mod openai_compat;
pub mod provider;
pub mod rate_limiter;
pub mod registry;
pub mod retry;
pub mod tokens;
pub mod types;

pub use cache::ManagerCache;
pub use chunker::TextChunker;
pub use cohere::CohereProvider;
pub use config::ProviderSpec;
pub use error::{ProviderError, Result};
pub use gateway::Gateway;
pub use gemini::{GeminiProvider, GeminiRestClient, GenerativeClient};
pub use keys::{ChainKeyResolver, EnvKeyResolver, KeyResolver, StaticKeyResolver};
pub use manager::{PriorityPolicy, ProviderManager};
pub use openai_compat::ChatCompletionProvider;
pub use provider::{Availability, CallContext, Completion, GenerateRequest, Provider};
pub use rate_limiter::RateLimiter;
pub use registry::ProviderRegistry;
pub use retry::{RetryPolicy, run_with_retry};
pub use tokens::{TokenMonitor, estimate_tokens};
