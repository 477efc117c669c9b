//! OpenRouter HTTP backend implementation
//!
//! OpenRouter exposes an OpenAI-compatible chat completions API. JSON mode is
//! requested through `response_format`: `json_schema` when a schema is given,
//! `json_object` otherwise.

use async_trait::async_trait;
use ideaforge_config::{ProviderKind, ProviderSettings};
use ideaforge_utils::error::LlmError;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use crate::http_client::{HttpClient, endpoint};
use crate::types::{LlmBackend, LlmInvocation, LlmResult, Message, ResponseFormat};

/// HTTP referer header value
const DEFAULT_REFERER: &str = "https://github.com/ideaforge/ideaforge";

/// X-Title header value
const DEFAULT_TITLE: &str = "ideaforge";

const PROVIDER: &str = "openrouter";

/// Backend for OpenRouter chat completions
#[derive(Clone)]
pub struct OpenRouterBackend {
    client: HttpClient,
    url: String,
    api_key: String,
    default_model: String,
    max_tokens: u32,
}

impl std::fmt::Debug for OpenRouterBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenRouterBackend")
            .field("url", &self.url)
            .field("default_model", &self.default_model)
            .finish_non_exhaustive()
    }
}

impl OpenRouterBackend {
    /// # Errors
    ///
    /// Returns `LlmError::Misconfiguration` if the HTTP client cannot be constructed
    pub fn new(settings: &ProviderSettings, api_key: impl Into<String>) -> Result<Self, LlmError> {
        Ok(Self {
            client: HttpClient::shared()?,
            url: endpoint(&settings.base_url, "chat/completions"),
            api_key: api_key.into(),
            default_model: settings.model.clone(),
            max_tokens: settings.max_tokens,
        })
    }

    /// Create a backend reading the API key from `settings.api_key_env`.
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Misconfiguration` if:
    /// - The API key environment variable is not set
    /// - The HTTP client cannot be constructed
    pub fn from_settings(settings: &ProviderSettings) -> Result<Self, LlmError> {
        let api_key = settings.api_key().ok_or_else(|| {
            LlmError::Misconfiguration(format!(
                "OpenRouter API key not found in environment variable '{}'. \
                 Set this variable or configure a different api_key_env in [llm.openrouter].",
                settings.api_key_env
            ))
        })?;
        Self::new(settings, api_key)
    }

    fn convert_messages(messages: &[Message]) -> Vec<OpenAiMessage> {
        messages
            .iter()
            .map(|msg| OpenAiMessage {
                role: msg.role.as_str().to_string(),
                content: msg.content.clone(),
            })
            .collect()
    }
}

fn response_format(format: &ResponseFormat) -> Option<Value> {
    match format {
        ResponseFormat::Text => None,
        ResponseFormat::Json { schema: None } => Some(json!({"type": "json_object"})),
        ResponseFormat::Json {
            schema: Some(schema),
        } => Some(json!({
            "type": "json_schema",
            "json_schema": {
                "name": "response",
                "strict": false,
                "schema": schema,
            }
        })),
    }
}

#[async_trait]
impl LlmBackend for OpenRouterBackend {
    fn name(&self) -> &str {
        ProviderKind::OpenRouter.as_str()
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    async fn invoke(&self, inv: LlmInvocation) -> Result<LlmResult, LlmError> {
        let model = if inv.model.is_empty() {
            self.default_model.clone()
        } else {
            inv.model.clone()
        };
        let max_tokens = inv.max_tokens().unwrap_or(self.max_tokens);

        debug!(
            provider = PROVIDER,
            label = %inv.label,
            model = %model,
            max_tokens,
            json = inv.response_format.is_json(),
            "Invoking OpenRouter backend"
        );

        let body = OpenRouterRequest {
            model: model.clone(),
            messages: Self::convert_messages(&inv.messages),
            max_tokens,
            temperature: inv.temperature(),
            response_format: response_format(&inv.response_format),
            stream: false,
        };

        let request = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("HTTP-Referer", DEFAULT_REFERER)
            .header("X-Title", DEFAULT_TITLE)
            .header("Content-Type", "application/json")
            .json(&body);

        let response = self.client.send(request, inv.timeout, PROVIDER).await?;

        let response_body: OpenRouterResponse = response.json().await.map_err(|e| {
            LlmError::Transport(format!("Failed to parse OpenRouter response: {e}"))
        })?;

        let choice = response_body.choices.into_iter().next().ok_or_else(|| {
            LlmError::Transport("OpenRouter response missing choices[0]".to_string())
        })?;

        let content = choice
            .message
            .content
            .filter(|c| !c.is_empty())
            .ok_or_else(|| {
                LlmError::Transport("OpenRouter response missing content in choices[0]".to_string())
            })?;

        let mut result = LlmResult::new(content, PROVIDER, response_body.model.unwrap_or(model));
        if let Some(usage) = response_body.usage {
            result = result.with_tokens(usage.prompt_tokens, usage.completion_tokens);
        }

        debug!(
            provider = PROVIDER,
            tokens_input = ?result.tokens_input,
            tokens_output = ?result.tokens_output,
            "OpenRouter invocation completed"
        );

        Ok(result)
    }
}

#[derive(Debug, Clone, Serialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct OpenRouterRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
    stream: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenRouterResponse {
    choices: Vec<Choice>,
    model: Option<String>,
    usage: Option<Usage>,
}

#[derive(Debug, Clone, Deserialize)]
struct Choice {
    message: OpenAiResponseMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct Usage {
    prompt_tokens: u64,
    completion_tokens: u64,
}
