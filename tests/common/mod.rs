//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use ideaforge_llm::test_support::ScriptedBackend;
use ideaforge::llm::{CircuitBreaker, LlmBackend, ResilienceOptions, ResilientClient};

/// No retries and no backoff, so failure paths stay fast.
pub fn fast_options() -> ResilienceOptions {
    ResilienceOptions {
        timeout: Duration::from_secs(5),
        retry_attempts: 1,
        backoff_base: Duration::ZERO,
    }
}

/// A resilient client over `backend`, keeping a handle for assertions.
pub fn scripted_client(backend: ScriptedBackend) -> (Arc<ScriptedBackend>, Arc<ResilientClient>) {
    let backend = Arc::new(backend);
    let primary: Arc<dyn LlmBackend> = backend.clone();
    let client = ResilientClient::new(primary, Arc::new(CircuitBreaker::default()))
        .with_options(fast_options());
    (backend, Arc::new(client))
}

/// Labels of every call the backend received, in order.
pub fn labels(backend: &ScriptedBackend) -> Vec<String> {
    backend.invocations().into_iter().map(|inv| inv.label).collect()
}
