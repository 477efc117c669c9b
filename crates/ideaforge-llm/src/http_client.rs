//! Shared HTTP client infrastructure for the HTTP providers
//!
//! One `reqwest::Client` is built per process and reused by every backend,
//! so connections are pooled across providers and runs. Each call here is a
//! single attempt; retry policy belongs to the resilient client.

use ideaforge_utils::error::LlmError;
use ideaforge_utils::redaction::redact;
use once_cell::sync::OnceCell;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Default connect timeout (10 seconds)
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest provider error body kept in an error message
const MAX_ERROR_BODY_CHARS: usize = 300;

static SHARED: OnceCell<HttpClient> = OnceCell::new();

/// Pooled HTTP client shared by the HTTP providers.
#[derive(Clone)]
pub struct HttpClient {
    client: Arc<Client>,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient").finish_non_exhaustive()
    }
}

impl HttpClient {
    /// The process-wide client, built on first use.
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Misconfiguration` if the client cannot be constructed
    pub fn shared() -> Result<Self, LlmError> {
        SHARED.get_or_try_init(Self::build).cloned()
    }

    fn build() -> Result<Self, LlmError> {
        let client = Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .use_rustls_tls()
            .build()
            .map_err(|e| LlmError::Misconfiguration(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client: Arc::new(client),
        })
    }

    /// Start a POST request on the shared client.
    pub fn post(&self, url: &str) -> RequestBuilder {
        self.client.post(url)
    }

    /// Send one request and map failures onto [`LlmError`].
    ///
    /// # Errors
    ///
    /// - `LlmError::ProviderAuth` for 401/403
    /// - `LlmError::ProviderQuota` for 429
    /// - `LlmError::Rejected` for any other 4xx
    /// - `LlmError::ProviderOutage` for 5xx
    /// - `LlmError::Timeout` when the request times out
    /// - `LlmError::Transport` for connection failures
    pub async fn send(
        &self,
        request: RequestBuilder,
        timeout: Duration,
        provider_name: &str,
    ) -> Result<Response, LlmError> {
        debug!(
            provider = provider_name,
            timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            "Executing HTTP request"
        );

        let response = request.timeout(timeout).send().await.map_err(|e| {
            if e.is_timeout() {
                LlmError::Timeout { duration: timeout }
            } else {
                LlmError::Transport(format!(
                    "{provider_name} request failed: {}",
                    redact(&e.to_string())
                ))
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(map_status(status, provider_name, &body))
    }
}

/// Map an unsuccessful HTTP status onto an [`LlmError`] variant.
pub(crate) fn map_status(status: StatusCode, provider_name: &str, body: &str) -> LlmError {
    let detail = error_detail(status, body);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            LlmError::ProviderAuth(format!("{provider_name} authentication failed: {detail}"))
        }
        StatusCode::TOO_MANY_REQUESTS => {
            LlmError::ProviderQuota(format!("{provider_name} rate limit exceeded: {detail}"))
        }
        s if s.is_server_error() => {
            LlmError::ProviderOutage(format!("{provider_name} returned server error: {detail}"))
        }
        s => LlmError::Rejected {
            status: s.as_u16(),
            message: format!("{provider_name}: {detail}"),
        },
    }
}

fn error_detail(status: StatusCode, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        return status.to_string();
    }
    let truncated: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
    format!("{status} {}", redact(&truncated))
}

/// Join a configured base URL and an endpoint path without doubling slashes.
pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
