//! # stratagate-types
//!
//! Core type definitions for the stratagate provider gateway.
//!
//! Every other stratagate crate depends on this one. It contains:
//!
//! - **[`error`]** -- [`GatewayError`], the top-level error type
//! - **[`config`]** -- The typed [`GatewayConfig`](config::GatewayConfig) schema
//! - **[`provider`]** -- Canonical provider ids, attempts, and results
//! - **[`secret`]** -- [`SecretString`](secret::SecretString) for API keys
//! - **[`usage`]** -- Token usage records and rate-limit snapshots

pub mod config;
pub mod error;
pub mod provider;
pub mod secret;
pub mod usage;

pub use error::{GatewayError, Result};
pub use provider::{
    GenerationConfig, ProviderAttempt, ProviderId, ProviderResult, RequestMetadata,
};
