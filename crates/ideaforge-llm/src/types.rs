//! Core types for the LLM backend abstraction

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use ideaforge_utils::error::LlmError;

/// Role of a message in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System-level instructions
    System,
    /// User input
    User,
    /// Assistant response
    Assistant,
}

impl Role {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A single message in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }
}

/// Shape the caller wants the answer in.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ResponseFormat {
    #[default]
    Text,
    /// A JSON value, optionally constrained by a JSON Schema.
    Json { schema: Option<serde_json::Value> },
}

impl ResponseFormat {
    #[must_use]
    pub fn is_json(&self) -> bool {
        matches!(self, Self::Json { .. })
    }

    #[must_use]
    pub fn schema(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json { schema } => schema.as_ref(),
            Self::Text => None,
        }
    }
}

/// Input to one backend invocation
#[derive(Debug, Clone)]
pub struct LlmInvocation {
    /// What the call is for (`planner`, `SchemaAgent`, ...); used in logs
    pub label: String,
    /// Model to use; empty means the backend default
    pub model: String,
    /// Transport-level timeout for this invocation
    pub timeout: Duration,
    /// Ordered list of messages in the conversation
    pub messages: Vec<Message>,
    /// Requested answer shape
    pub response_format: ResponseFormat,
    /// Provider parameters (`temperature`, `max_tokens`)
    pub metadata: HashMap<String, serde_json::Value>,
}

impl LlmInvocation {
    #[must_use]
    pub fn new(
        label: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
        messages: Vec<Message>,
    ) -> Self {
        Self {
            label: label.into(),
            model: model.into(),
            timeout,
            messages,
            response_format: ResponseFormat::Text,
            metadata: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    #[must_use]
    pub fn with_response_format(mut self, format: ResponseFormat) -> Self {
        self.response_format = format;
        self
    }

    /// `temperature` from metadata, if set and numeric.
    #[must_use]
    pub fn temperature(&self) -> Option<f32> {
        self.metadata
            .get("temperature")
            .and_then(|v| v.as_f64())
            .map(|v| v as f32)
    }

    /// `max_tokens` from metadata, if set and a positive integer.
    #[must_use]
    pub fn max_tokens(&self) -> Option<u32> {
        self.metadata
            .get("max_tokens")
            .and_then(|v| v.as_u64())
            .and_then(|v| u32::try_from(v).ok())
            .filter(|v| *v > 0)
    }
}

/// Result from one backend invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResult {
    /// Raw response text from the model
    pub raw_response: String,
    /// Provider name (`anthropic`, `openrouter`)
    pub provider: String,
    /// Model that was actually used
    pub model_used: String,
    pub tokens_input: Option<u64>,
    pub tokens_output: Option<u64>,
}

impl LlmResult {
    #[must_use]
    pub fn new(
        raw_response: impl Into<String>,
        provider: impl Into<String>,
        model_used: impl Into<String>,
    ) -> Self {
        Self {
            raw_response: raw_response.into(),
            provider: provider.into(),
            model_used: model_used.into(),
            tokens_input: None,
            tokens_output: None,
        }
    }

    #[must_use]
    pub fn with_tokens(mut self, input: u64, output: u64) -> Self {
        self.tokens_input = Some(input);
        self.tokens_output = Some(output);
        self
    }
}

/// Trait for LLM backend implementations
///
/// Backends perform exactly one attempt per `invoke`. Retries, fallback and
/// the circuit breaker live in [`crate::ResilientClient`].
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Provider name used in logs and responses.
    fn name(&self) -> &str;

    /// Model used when the invocation does not name one.
    fn default_model(&self) -> &str;

    /// Invoke the model once.
    ///
    /// # Errors
    ///
    /// Returns `LlmError` for any failure during invocation, including:
    /// - Transport failures (network errors)
    /// - Provider errors (auth, quota, outages, rejected requests)
    /// - Timeouts
    async fn invoke(&self, inv: LlmInvocation) -> Result<LlmResult, LlmError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_invocation_parameter_accessors() {
        let inv = LlmInvocation::new("planner", "", Duration::from_secs(5), vec![Message::user("hi")])
            .with_metadata("temperature", json!(0.3))
            .with_metadata("max_tokens", json!(1024));
        assert_eq!(inv.temperature(), Some(0.3));
        assert_eq!(inv.max_tokens(), Some(1024));
    }

    #[test]
    fn test_invalid_max_tokens_is_ignored() {
        let inv = LlmInvocation::new("x", "", Duration::from_secs(5), vec![])
            .with_metadata("max_tokens", json!(0))
            .with_metadata("temperature", json!("warm"));
        assert_eq!(inv.max_tokens(), None);
        assert_eq!(inv.temperature(), None);
    }

    #[test]
    fn test_response_format_schema() {
        let format = ResponseFormat::Json {
            schema: Some(json!({"type": "object"})),
        };
        assert!(format.is_json());
        assert_eq!(format.schema(), Some(&json!({"type": "object"})));
        assert!(!ResponseFormat::Text.is_json());
        assert_eq!(ResponseFormat::Text.schema(), None);
    }

    #[test]
    fn test_result_with_tokens() {
        let result = LlmResult::new("ok", "anthropic", "claude").with_tokens(10, 20);
        assert_eq!(result.tokens_input, Some(10));
        assert_eq!(result.tokens_output, Some(20));
    }
}
