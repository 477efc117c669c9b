//! LLM access for ideaforge.
//!
//! Providers implement [`LlmBackend`] and perform exactly one HTTP attempt
//! per call. [`ResilientClient`] layers timeout, retry with backoff, the
//! shared [`CircuitBreaker`] and provider fallback on top, and turns model
//! text into schema-checked JSON when asked to.

mod anthropic_backend;
mod circuit_breaker;
mod http_client;
pub mod json;
mod openrouter_backend;
mod resilient;
mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_support;

pub use anthropic_backend::AnthropicBackend;
pub use circuit_breaker::{BreakerPermit, CircuitBreaker, CircuitState};
pub use http_client::HttpClient;
pub use ideaforge_utils::error::LlmError;
pub use openrouter_backend::OpenRouterBackend;
pub use resilient::{
    ApiRequest, ApiResponse, RequestOptions, ResilienceOptions, ResilientClient, ResponseBody,
};
pub use types::{LlmBackend, LlmInvocation, LlmResult, Message, ResponseFormat, Role};

use ideaforge_config::{Config, ProviderKind};
use ideaforge_utils::progress::ProgressHub;
use std::sync::Arc;
use tracing::{debug, warn};

/// Construct the backend for one provider, reading its API key from the
/// environment.
///
/// # Errors
///
/// Returns `LlmError::Misconfiguration` if the API key is missing or the
/// HTTP client cannot be constructed.
pub fn backend_for(kind: ProviderKind, config: &Config) -> Result<Arc<dyn LlmBackend>, LlmError> {
    let settings = config.llm.settings_for(kind);
    let backend: Arc<dyn LlmBackend> = match kind {
        ProviderKind::Anthropic => Arc::new(AnthropicBackend::from_settings(settings)?),
        ProviderKind::OpenRouter => Arc::new(OpenRouterBackend::from_settings(settings)?),
    };
    debug!(provider = %kind, model = %settings.model, "Constructed LLM backend");
    Ok(backend)
}

/// A breaker tuned by `[resilience]`.
#[must_use]
pub fn breaker_from_config(config: &Config) -> CircuitBreaker {
    CircuitBreaker::new(
        config.resilience.failure_threshold,
        config.resilience.cooldown(),
    )
}

/// Build the resilient client described by `config`.
///
/// A fallback provider whose API key is missing is skipped with a warning;
/// a primary provider that cannot be constructed is an error.
///
/// # Errors
///
/// Returns `LlmError::Misconfiguration` if the primary provider cannot be
/// constructed.
pub fn client_from_config(
    config: &Config,
    breaker: Arc<CircuitBreaker>,
    progress: ProgressHub,
) -> Result<ResilientClient, LlmError> {
    let primary = backend_for(config.llm.provider, config)?;
    let mut client = ResilientClient::new(primary, breaker)
        .with_options(ResilienceOptions::from(&config.resilience))
        .with_progress(progress);

    if let Some(kind) = config.llm.fallback_provider {
        match backend_for(kind, config) {
            Ok(fallback) => client = client.with_fallback(fallback),
            Err(err) => warn!(provider = %kind, error = %err, "Fallback provider unavailable, continuing without it"),
        }
    }

    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_breaker_from_config() {
        let config = Config::builder()
            .failure_threshold(7)
            .cooldown(std::time::Duration::from_secs(5))
            .build()
            .unwrap();
        let breaker = breaker_from_config(&config);
        assert_eq!(breaker.threshold(), 7);
        assert_eq!(breaker.cooldown(), std::time::Duration::from_secs(5));
    }

    #[test]
    fn test_missing_primary_key_is_misconfiguration() {
        let config = Config::builder()
            .api_key_env(ProviderKind::Anthropic, "IDEAFORGE_TEST_UNSET_PRIMARY_KEY")
            .build()
            .unwrap();
        let result = client_from_config(
            &config,
            Arc::new(CircuitBreaker::default()),
            ProgressHub::new(),
        );
        assert!(matches!(result, Err(LlmError::Misconfiguration(_))));
    }
}
