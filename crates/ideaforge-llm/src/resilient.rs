//! Resilient call layer: one logical request against the configured
//! providers, guarded by timeout, retry with exponential backoff, the
//! circuit breaker and a single fallback attempt.

use ideaforge_config::ResilienceSettings;
use ideaforge_utils::error::LlmError;
use ideaforge_utils::progress::{ProgressEvent, ProgressHub, ProgressKind};
use ideaforge_utils::redaction::redact;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::circuit_breaker::CircuitBreaker;
use crate::json::{parse_json, validate_against};
use crate::types::{LlmBackend, LlmInvocation, Message, ResponseFormat};

/// Generation options for one request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    pub expect_json: bool,
    pub response_schema: Option<Value>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl RequestOptions {
    #[must_use]
    pub fn json() -> Self {
        Self {
            expect_json: true,
            ..Self::default()
        }
    }

    /// Expect JSON conforming to `schema`.
    #[must_use]
    pub fn with_schema(mut self, schema: Value) -> Self {
        self.expect_json = true;
        self.response_schema = Some(schema);
        self
    }

    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    fn response_format(&self) -> ResponseFormat {
        if self.expect_json || self.response_schema.is_some() {
            ResponseFormat::Json {
                schema: self.response_schema.clone(),
            }
        } else {
            ResponseFormat::Text
        }
    }
}

/// One logical request.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    /// What the call is for; shows up in progress events and logs.
    pub label: String,
    /// Model for the primary provider; `None` uses its default.
    pub model: Option<String>,
    pub prompt: String,
    pub options: RequestOptions,
}

impl ApiRequest {
    pub fn new(label: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            model: None,
            prompt: prompt.into(),
            options: RequestOptions::default(),
        }
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Text(String),
    Json(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub body: ResponseBody,
    pub provider: String,
    pub model: String,
    pub used_fallback: bool,
}

impl ApiResponse {
    /// Text answer, or the JSON answer re-serialized.
    #[must_use]
    pub fn text(&self) -> String {
        match &self.body {
            ResponseBody::Text(text) => text.clone(),
            ResponseBody::Json(value) => value.to_string(),
        }
    }

    #[must_use]
    pub fn json(&self) -> Option<&Value> {
        match &self.body {
            ResponseBody::Json(value) => Some(value),
            ResponseBody::Text(_) => None,
        }
    }

    /// Take the JSON answer.
    ///
    /// # Errors
    ///
    /// `LlmError::InvalidJson` for a text answer.
    pub fn into_json(self) -> Result<Value, LlmError> {
        match self.body {
            ResponseBody::Json(value) => Ok(value),
            ResponseBody::Text(_) => Err(LlmError::InvalidJson(
                "expected a JSON response but the request did not ask for one".to_string(),
            )),
        }
    }
}

/// Timeout and retry tuning for [`ResilientClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResilienceOptions {
    /// Per-attempt timeout.
    pub timeout: Duration,
    /// Attempts against the primary provider, first one included.
    pub retry_attempts: u32,
    /// Delay before retry `n` is `backoff_base * 2^n`.
    pub backoff_base: Duration,
}

impl Default for ResilienceOptions {
    fn default() -> Self {
        Self::from(&ResilienceSettings::default())
    }
}

impl From<&ResilienceSettings> for ResilienceOptions {
    fn from(settings: &ResilienceSettings) -> Self {
        Self {
            timeout: settings.timeout(),
            retry_attempts: settings.retry_attempts,
            backoff_base: settings.backoff_base(),
        }
    }
}

impl ResilienceOptions {
    fn backoff_for(&self, attempt: u32) -> Duration {
        self.backoff_base
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Calls the primary provider with retries, then the fallback provider once.
///
/// The circuit breaker sees one outcome per [`Self::execute`]: success, or a
/// failure after every provider was tried. Structural failures (the
/// provider answered, but not in the requested shape) are neither retried
/// nor sent to the fallback and count as a reachable provider.
#[derive(Clone)]
pub struct ResilientClient {
    primary: Arc<dyn LlmBackend>,
    fallback: Option<Arc<dyn LlmBackend>>,
    breaker: Arc<CircuitBreaker>,
    options: ResilienceOptions,
    progress: ProgressHub,
}

impl std::fmt::Debug for ResilientClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientClient")
            .field("primary", &self.primary.name())
            .field("fallback", &self.fallback.as_ref().map(|b| b.name().to_string()))
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl ResilientClient {
    pub fn new(primary: Arc<dyn LlmBackend>, breaker: Arc<CircuitBreaker>) -> Self {
        Self {
            primary,
            fallback: None,
            breaker,
            options: ResilienceOptions::default(),
            progress: ProgressHub::new(),
        }
    }

    #[must_use]
    pub fn with_fallback(mut self, fallback: Arc<dyn LlmBackend>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: ResilienceOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn with_progress(mut self, progress: ProgressHub) -> Self {
        self.progress = progress;
        self
    }

    #[must_use]
    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    #[must_use]
    pub fn options(&self) -> ResilienceOptions {
        self.options
    }

    #[must_use]
    pub fn primary_name(&self) -> &str {
        self.primary.name()
    }

    #[must_use]
    pub fn fallback_name(&self) -> Option<&str> {
        self.fallback.as_deref().map(|b| b.name())
    }

    /// Execute one logical request.
    ///
    /// # Errors
    ///
    /// - `LlmError::ServiceUnavailable` without any network call while the
    ///   circuit is open
    /// - `LlmError::InvalidJson` / `LlmError::SchemaViolation` when a JSON
    ///   answer was requested and the provider's answer does not qualify
    /// - the primary provider's last error when every provider failed
    pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, LlmError> {
        let permit = match self.breaker.try_acquire() {
            Ok(permit) => permit,
            Err(retry_after) => {
                let err = LlmError::ServiceUnavailable { retry_after };
                warn!(label = %request.label, retry_after_ms = retry_after.as_millis() as u64, "Circuit open, call rejected");
                self.progress.emit(ProgressEvent::api(
                    ProgressKind::Failed,
                    &request.label,
                    err.to_string(),
                ));
                return Err(err);
            }
        };

        self.progress.emit(ProgressEvent::api(
            ProgressKind::Started,
            &request.label,
            format!("Calling {}", self.primary.name()),
        ));
        let started = Instant::now();

        let outcome = self.execute_with_fallback(&request).await;

        match &outcome {
            Ok(_) => permit.succeed(),
            Err(err) if err.is_structural() => permit.succeed(),
            Err(_) => permit.fail(),
        }

        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        match &outcome {
            Ok(response) => {
                debug!(
                    label = %request.label,
                    provider = %response.provider,
                    used_fallback = response.used_fallback,
                    elapsed_ms,
                    "Request completed"
                );
                self.progress.emit(ProgressEvent::api(
                    ProgressKind::Completed,
                    &request.label,
                    format!("Answered by {} in {elapsed_ms}ms", response.provider),
                ));
            }
            Err(err) => {
                warn!(label = %request.label, elapsed_ms, error = %redact(&err.to_string()), "Request failed");
                self.progress.emit(ProgressEvent::api(
                    ProgressKind::Failed,
                    &request.label,
                    redact(&err.to_string()),
                ));
            }
        }

        outcome
    }

    async fn execute_with_fallback(&self, request: &ApiRequest) -> Result<ApiResponse, LlmError> {
        let model = request
            .model
            .clone()
            .unwrap_or_else(|| self.primary.default_model().to_string());

        let primary_err = match self.call_with_retry(self.primary.as_ref(), &model, request).await {
            Ok(response) => return Ok(response),
            Err(err) => err,
        };

        if primary_err.is_structural() {
            return Err(primary_err);
        }
        let Some(fallback) = &self.fallback else {
            return Err(primary_err);
        };

        info!(
            label = %request.label,
            primary = self.primary.name(),
            fallback = fallback.name(),
            error = %redact(&primary_err.to_string()),
            "Primary provider failed, trying fallback"
        );

        match self
            .attempt(fallback.as_ref(), fallback.default_model(), request)
            .await
        {
            Ok(mut response) => {
                response.used_fallback = true;
                Ok(response)
            }
            Err(fallback_err) => {
                warn!(
                    label = %request.label,
                    fallback = fallback.name(),
                    error = %redact(&fallback_err.to_string()),
                    "Fallback provider failed"
                );
                Err(primary_err)
            }
        }
    }

    async fn call_with_retry(
        &self,
        backend: &dyn LlmBackend,
        model: &str,
        request: &ApiRequest,
    ) -> Result<ApiResponse, LlmError> {
        let attempts = self.options.retry_attempts.max(1);
        let mut attempt: u32 = 0;

        loop {
            match self.attempt(backend, model, request).await {
                Ok(response) => return Ok(response),
                Err(err) if err.is_transient() && attempt + 1 < attempts => {
                    let delay = self.options.backoff_for(attempt);
                    attempt += 1;
                    warn!(
                        label = %request.label,
                        provider = backend.name(),
                        attempt,
                        max_attempts = attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %redact(&err.to_string()),
                        "Provider request failed with retryable error; retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// One attempt: invoke under the timeout, then shape the answer.
    async fn attempt(
        &self,
        backend: &dyn LlmBackend,
        model: &str,
        request: &ApiRequest,
    ) -> Result<ApiResponse, LlmError> {
        let timeout = self.options.timeout;
        let mut invocation = LlmInvocation::new(
            request.label.clone(),
            model,
            timeout,
            vec![Message::user(request.prompt.clone())],
        )
        .with_response_format(request.options.response_format());
        if let Some(temperature) = request.options.temperature {
            invocation = invocation.with_metadata("temperature", json!(temperature));
        }
        if let Some(max_tokens) = request.options.max_tokens {
            invocation = invocation.with_metadata("max_tokens", json!(max_tokens));
        }

        let result = tokio::time::timeout(timeout, backend.invoke(invocation))
            .await
            .map_err(|_| LlmError::Timeout { duration: timeout })??;

        let body = if request.options.expect_json || request.options.response_schema.is_some() {
            let value = parse_json(&result.raw_response)?;
            if let Some(schema) = &request.options.response_schema {
                validate_against(&value, schema)?;
            }
            ResponseBody::Json(value)
        } else {
            ResponseBody::Text(result.raw_response)
        };

        Ok(ApiResponse {
            body,
            provider: result.provider,
            model: result.model_used,
            used_fallback: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedBackend;
    use ideaforge_utils::test_support::RecordingSink;

    fn fast_options(attempts: u32) -> ResilienceOptions {
        ResilienceOptions {
            timeout: Duration::from_millis(200),
            retry_attempts: attempts,
            backoff_base: Duration::from_millis(1),
        }
    }

    fn outage() -> LlmError {
        LlmError::ProviderOutage("500".to_string())
    }

    #[tokio::test]
    async fn test_text_response() {
        let primary = Arc::new(ScriptedBackend::new("anthropic").then_ok("hello"));
        let client = ResilientClient::new(primary.clone(), Arc::new(CircuitBreaker::default()))
            .with_options(fast_options(3));

        let response = client.execute(ApiRequest::new("t", "say hi")).await.unwrap();
        assert_eq!(response.body, ResponseBody::Text("hello".to_string()));
        assert!(!response.used_fallback);
        assert_eq!(primary.calls(), 1);
    }

    #[tokio::test]
    async fn test_json_response_is_fence_stripped_and_validated() {
        let primary = Arc::new(ScriptedBackend::new("anthropic").then_ok("```json\n{\"title\":\"x\"}\n```"));
        let client = ResilientClient::new(primary, Arc::new(CircuitBreaker::default()))
            .with_options(fast_options(3));

        let request = ApiRequest::new("t", "p").with_options(
            RequestOptions::default().with_schema(json!({"type": "object", "required": ["title"]})),
        );
        let response = client.execute(request).await.unwrap();
        assert_eq!(response.json(), Some(&json!({"title": "x"})));
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let primary = Arc::new(
            ScriptedBackend::new("anthropic")
                .then_err(outage())
                .then_err(LlmError::Transport("reset".into()))
                .then_ok("ok"),
        );
        let client = ResilientClient::new(primary.clone(), Arc::new(CircuitBreaker::default()))
            .with_options(fast_options(3));

        assert_eq!(client.execute(ApiRequest::new("t", "p")).await.unwrap().text(), "ok");
        assert_eq!(primary.calls(), 3);
    }

    #[tokio::test]
    async fn test_exhausted_retries_propagate_and_count_once() {
        let primary = Arc::new(ScriptedBackend::new("anthropic").always_err(outage()));
        let breaker = Arc::new(CircuitBreaker::default());
        let client = ResilientClient::new(primary.clone(), breaker.clone())
            .with_options(fast_options(3));

        let err = client.execute(ApiRequest::new("t", "p")).await.unwrap_err();
        assert!(matches!(err, LlmError::ProviderOutage(_)));
        assert_eq!(primary.calls(), 3);
        assert_eq!(breaker.consecutive_failures(), 1);
    }

    #[tokio::test]
    async fn test_non_transient_not_retried() {
        let primary = Arc::new(
            ScriptedBackend::new("anthropic").always_err(LlmError::ProviderAuth("401".into())),
        );
        let client = ResilientClient::new(primary.clone(), Arc::new(CircuitBreaker::default()))
            .with_options(fast_options(3));

        assert!(client.execute(ApiRequest::new("t", "p")).await.is_err());
        assert_eq!(primary.calls(), 1);
    }

    #[tokio::test]
    async fn test_invalid_json_is_structural() {
        let primary = Arc::new(ScriptedBackend::new("anthropic").always_ok("not json"));
        let fallback = Arc::new(ScriptedBackend::new("openrouter").always_ok("{}"));
        let breaker = Arc::new(CircuitBreaker::default());
        let client = ResilientClient::new(primary.clone(), breaker.clone())
            .with_fallback(fallback.clone())
            .with_options(fast_options(3));

        let err = client
            .execute(ApiRequest::new("t", "p").with_options(RequestOptions::json()))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::InvalidJson(_)));
        assert_eq!(primary.calls(), 1);
        assert_eq!(fallback.calls(), 0);
        assert_eq!(breaker.consecutive_failures(), 0);
    }

    #[tokio::test]
    async fn test_fallback_single_attempt_with_its_model() {
        let primary = Arc::new(ScriptedBackend::new("anthropic").always_err(outage()));
        let fallback = Arc::new(
            ScriptedBackend::new("openrouter")
                .with_default_model("openai/gpt-4o-mini")
                .then_ok("from fallback"),
        );
        let client = ResilientClient::new(primary.clone(), Arc::new(CircuitBreaker::default()))
            .with_fallback(fallback.clone())
            .with_options(fast_options(2));

        let response = client
            .execute(ApiRequest::new("t", "p").with_model("claude-haiku-4-5"))
            .await
            .unwrap();
        assert!(response.used_fallback);
        assert_eq!(response.provider, "openrouter");
        assert_eq!(primary.calls(), 2);
        assert_eq!(fallback.calls(), 1);
        assert_eq!(primary.models_seen(), vec!["claude-haiku-4-5", "claude-haiku-4-5"]);
        assert_eq!(fallback.models_seen(), vec!["openai/gpt-4o-mini"]);
    }

    #[tokio::test]
    async fn test_fallback_failure_reports_primary_error() {
        let primary = Arc::new(ScriptedBackend::new("anthropic").always_err(outage()));
        let fallback = Arc::new(
            ScriptedBackend::new("openrouter").always_err(LlmError::Transport("down".into())),
        );
        let client = ResilientClient::new(primary, Arc::new(CircuitBreaker::default()))
            .with_fallback(fallback.clone())
            .with_options(fast_options(1));

        let err = client.execute(ApiRequest::new("t", "p")).await.unwrap_err();
        assert!(matches!(err, LlmError::ProviderOutage(_)));
        assert_eq!(fallback.calls(), 1);
    }

    #[tokio::test]
    async fn test_attempt_timeout() {
        let primary = Arc::new(
            ScriptedBackend::new("anthropic")
                .with_delay(Duration::from_millis(500))
                .always_ok("late"),
        );
        let client = ResilientClient::new(primary.clone(), Arc::new(CircuitBreaker::default()))
            .with_options(ResilienceOptions {
                timeout: Duration::from_millis(20),
                retry_attempts: 2,
                backoff_base: Duration::from_millis(1),
            });

        match client.execute(ApiRequest::new("t", "p")).await {
            Err(LlmError::Timeout { duration }) => assert_eq!(duration, Duration::from_millis(20)),
            other => panic!("Expected Timeout, got {:?}", other),
        }
        assert_eq!(primary.calls(), 2);
    }

    #[tokio::test]
    async fn test_open_circuit_rejects_without_calling() {
        let primary = Arc::new(ScriptedBackend::new("anthropic").always_err(outage()));
        let breaker = Arc::new(CircuitBreaker::new(2, Duration::from_secs(60)));
        let client = ResilientClient::new(primary.clone(), breaker)
            .with_options(fast_options(1));

        for _ in 0..2 {
            assert!(client.execute(ApiRequest::new("t", "p")).await.is_err());
        }
        let err = client.execute(ApiRequest::new("t", "p")).await.unwrap_err();
        assert!(err.is_circuit_open());
        assert_eq!(primary.calls(), 2);
    }

    #[tokio::test]
    async fn test_progress_events_per_logical_call() {
        let sink = Arc::new(RecordingSink::default());
        let primary = Arc::new(
            ScriptedBackend::new("anthropic")
                .then_err(outage())
                .then_ok("ok"),
        );
        let client = ResilientClient::new(primary, Arc::new(CircuitBreaker::default()))
            .with_options(fast_options(3))
            .with_progress(ProgressHub::new().with_sink(sink.clone()));

        client.execute(ApiRequest::new("planner", "p")).await.unwrap();
        assert_eq!(
            sink.api_events(),
            vec![
                (ProgressKind::Started, "planner".to_string()),
                (ProgressKind::Completed, "planner".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_options_forwarded_to_backend() {
        let primary = Arc::new(ScriptedBackend::new("anthropic").always_ok("{}"));
        let client = ResilientClient::new(primary.clone(), Arc::new(CircuitBreaker::default()))
            .with_options(fast_options(1));

        let options = RequestOptions::json().with_temperature(0.3).with_max_tokens(512);
        client
            .execute(ApiRequest::new("t", "p").with_options(options))
            .await
            .unwrap();

        let inv = primary.last_invocation().unwrap();
        assert_eq!(inv.temperature(), Some(0.3));
        assert_eq!(inv.max_tokens(), Some(512));
        assert!(inv.response_format.is_json());
    }

    #[test]
    fn test_backoff_doubles() {
        let options = ResilienceOptions {
            timeout: Duration::from_secs(1),
            retry_attempts: 3,
            backoff_base: Duration::from_millis(100),
        };
        assert_eq!(options.backoff_for(0), Duration::from_millis(100));
        assert_eq!(options.backoff_for(1), Duration::from_millis(200));
        assert_eq!(options.backoff_for(2), Duration::from_millis(400));
    }
}
