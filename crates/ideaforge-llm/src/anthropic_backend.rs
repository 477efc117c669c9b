//! Anthropic HTTP backend implementation
//!
//! Talks to the Messages API. Anthropic has no native JSON mode, so a JSON
//! request is expressed as an extra system instruction carrying the schema.

use async_trait::async_trait;
use ideaforge_config::{ProviderKind, ProviderSettings};
use ideaforge_utils::error::LlmError;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::http_client::{HttpClient, endpoint};
use crate::types::{LlmBackend, LlmInvocation, LlmResult, Message, ResponseFormat, Role};

/// Anthropic API version header value
const ANTHROPIC_VERSION: &str = "2023-06-01";

const PROVIDER: &str = "anthropic";

/// Backend for the Anthropic Messages API
#[derive(Clone)]
pub struct AnthropicBackend {
    client: HttpClient,
    url: String,
    api_key: String,
    default_model: String,
    max_tokens: u32,
}

impl std::fmt::Debug for AnthropicBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicBackend")
            .field("url", &self.url)
            .field("default_model", &self.default_model)
            .finish_non_exhaustive()
    }
}

impl AnthropicBackend {
    /// Create a backend with an explicit API key.
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Misconfiguration` if the HTTP client cannot be constructed
    pub fn new(settings: &ProviderSettings, api_key: impl Into<String>) -> Result<Self, LlmError> {
        Ok(Self {
            client: HttpClient::shared()?,
            url: endpoint(&settings.base_url, "v1/messages"),
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
                "Anthropic API key not found in environment variable '{}'. \
                 Set this variable or configure a different api_key_env in [llm.anthropic].",
                settings.api_key_env
            ))
        })?;
        Self::new(settings, api_key)
    }

    /// Split system messages out of the conversation, as the Messages API
    /// wants them in a dedicated field.
    fn convert_messages(
        messages: &[Message],
        format: &ResponseFormat,
    ) -> (Option<String>, Vec<AnthropicMessage>) {
        let mut system_parts: Vec<String> = Vec::new();
        let mut converted = Vec::new();

        for msg in messages {
            match msg.role {
                Role::System => system_parts.push(msg.content.clone()),
                Role::User | Role::Assistant => converted.push(AnthropicMessage {
                    role: msg.role.as_str().to_string(),
                    content: msg.content.clone(),
                }),
            }
        }

        if let Some(instruction) = json_instruction(format) {
            system_parts.push(instruction);
        }

        let system = (!system_parts.is_empty()).then(|| system_parts.join("\n\n"));
        (system, converted)
    }
}

fn json_instruction(format: &ResponseFormat) -> Option<String> {
    let ResponseFormat::Json { schema } = format else {
        return None;
    };
    let mut instruction = String::from(
        "Respond with a single JSON value and nothing else: no prose, no markdown code fences.",
    );
    if let Some(schema) = schema {
        let pretty = serde_json::to_string_pretty(schema).unwrap_or_else(|_| schema.to_string());
        instruction.push_str("\nThe JSON must conform to this JSON Schema:\n");
        instruction.push_str(&pretty);
    }
    Some(instruction)
}

#[async_trait]
impl LlmBackend for AnthropicBackend {
    fn name(&self) -> &str {
        ProviderKind::Anthropic.as_str()
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
        let (system, messages) = Self::convert_messages(&inv.messages, &inv.response_format);

        debug!(
            provider = PROVIDER,
            label = %inv.label,
            model = %model,
            max_tokens,
            json = inv.response_format.is_json(),
            "Invoking Anthropic backend"
        );

        let body = AnthropicRequest {
            model: model.clone(),
            messages,
            max_tokens,
            temperature: inv.temperature(),
            system,
        };

        let request = self
            .client
            .post(&self.url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body);

        let response = self.client.send(request, inv.timeout, PROVIDER).await?;

        let response_body: AnthropicResponse = response.json().await.map_err(|e| {
            LlmError::Transport(format!("Failed to parse Anthropic response: {e}"))
        })?;

        let content: String = response_body
            .content
            .iter()
            .filter(|block| block.content_type == "text")
            .filter_map(|block| block.text.as_deref())
            .collect();

        if content.is_empty() {
            return Err(LlmError::Transport(
                "Anthropic response missing text content".to_string(),
            ));
        }

        let mut result = LlmResult::new(content, PROVIDER, response_body.model.unwrap_or(model));
        if let Some(usage) = response_body.usage {
            result = result.with_tokens(usage.input_tokens, usage.output_tokens);
        }

        debug!(
            provider = PROVIDER,
            tokens_input = ?result.tokens_input,
            tokens_output = ?result.tokens_output,
            "Anthropic invocation completed"
        );

        Ok(result)
    }
}

#[derive(Debug, Clone, Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Serialize)]
struct AnthropicRequest {
    model: String,
    messages: Vec<AnthropicMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
    model: Option<String>,
    usage: Option<Usage>,
}

#[derive(Debug, Clone, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct Usage {
    input_tokens: u64,
    output_tokens: u64,
}
