//! Error taxonomy for ideaforge.
//!
//! Each layer has its own `thiserror` enum. The split mirrors how a failure
//! is handled rather than where it happened:
//!
//! - [`LlmError`]: one provider call. Transient variants are retried by the
//!   resilient client; structural variants (`InvalidJson`,
//!   `SchemaViolation`) never are.
//! - [`UnitError`]: one generation unit refused to run or failed. Captured
//!   into a failed `TaskResult`, never propagated past the executor.
//! - [`PlanError`]: the planning model produced something unusable. Always
//!   recovered by the deterministic fallback plan, only logged.
//! - [`AssemblyError`]: the final bundle could not be produced. Fatal.
//! - [`ForgeError`]: what a caller of a whole run sees.
//!
//! Every user-facing error also implements [`UserFriendlyError`] so the CLI
//! can print context and suggestions next to the message.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::types::{DocumentType, UnitName};

/// Trait for providing user-friendly error reporting with context and suggestions
pub trait UserFriendlyError {
    /// Get a user-friendly error message
    fn user_message(&self) -> String;

    /// Get contextual information about the error
    fn context(&self) -> Option<String>;

    /// Get suggested actions to resolve the error
    fn suggestions(&self) -> Vec<String>;

    /// Get the error category for grouping similar errors
    fn category(&self) -> ErrorCategory;
}

/// Categories of errors for better organization and handling
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Provider,
    Planning,
    Generation,
    Assembly,
    Storage,
    Validation,
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "Configuration"),
            Self::Provider => write!(f, "LLM Provider"),
            Self::Planning => write!(f, "Planning"),
            Self::Generation => write!(f, "Document Generation"),
            Self::Assembly => write!(f, "Final Assembly"),
            Self::Storage => write!(f, "Settings Storage"),
            Self::Validation => write!(f, "Validation"),
            Self::Internal => write!(f, "Internal"),
        }
    }
}

/// Parsing and bookkeeping errors for the closed domain enumerations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NameError {
    #[error("Unknown document type: '{0}'")]
    UnknownDocument(String),

    #[error("Unknown generation unit: '{0}'")]
    UnknownUnit(String),

    #[error("Unknown execution mode: '{0}' (expected 'sequential' or 'parallel')")]
    UnknownMode(String),

    #[error("Document '{0}' was already recorded in the plan")]
    DuplicateDocument(DocumentType),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration file: {0}")]
    InvalidFile(String),

    #[error("Invalid configuration value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found at {path}")]
    NotFound { path: String },

    #[error("Configuration discovery failed: {reason}")]
    DiscoveryFailed { reason: String },

    #[error("Configuration validation failed: {error_count} errors")]
    ValidationFailed {
        errors: Vec<String>,
        error_count: usize,
    },
}

impl UserFriendlyError for ConfigError {
    fn user_message(&self) -> String {
        match self {
            Self::InvalidFile(reason) => format!("The configuration file is invalid: {reason}"),
            Self::InvalidValue { key, value } => {
                format!("Configuration key '{key}' has an invalid value: {value}")
            }
            Self::NotFound { path } => format!("No configuration file at {path}"),
            Self::DiscoveryFailed { reason } => {
                format!("Could not locate a configuration file: {reason}")
            }
            Self::ValidationFailed { errors, .. } => {
                format!("Configuration is invalid:\n  - {}", errors.join("\n  - "))
            }
        }
    }

    fn context(&self) -> Option<String> {
        Some(
            "Configuration is read from CLI flags, IDEAFORGE_* environment variables and .ideaforge/config.toml, in that order."
                .to_string(),
        )
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::InvalidFile(_) => vec![
                "Check the TOML syntax of .ideaforge/config.toml".to_string(),
                "Run 'ideaforge config' to see which file is being loaded".to_string(),
            ],
            Self::NotFound { .. } => vec![
                "Check the path passed to --config".to_string(),
                "Omit --config to use discovery".to_string(),
            ],
            _ => vec!["Run 'ideaforge config' to inspect the effective configuration".to_string()],
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Configuration
    }
}

/// Errors that can occur during LLM backend operations
#[derive(Debug, Clone, Error)]
pub enum LlmError {
    /// Connection-level failure (DNS, refused, reset)
    #[error("Transport error: {0}")]
    Transport(String),

    /// The provider refused the request itself (4xx other than auth/quota)
    #[error("Request rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    /// Provider authentication failure (401, 403, missing API key)
    #[error("Provider authentication error: {0}")]
    ProviderAuth(String),

    /// Provider quota/rate limit exceeded (429)
    #[error("Provider quota exceeded: {0}")]
    ProviderQuota(String),

    /// Provider service outage (5xx errors)
    #[error("Provider outage: {0}")]
    ProviderOutage(String),

    /// Invocation timed out
    #[error("Timeout after {duration:?}")]
    Timeout { duration: Duration },

    /// Circuit breaker is open; no call was attempted
    #[error("Service unavailable: circuit open, retry in {retry_after:?}")]
    ServiceUnavailable { retry_after: Duration },

    /// The response was expected to be JSON and was not
    #[error("Invalid JSON in provider response: {0}")]
    InvalidJson(String),

    /// The JSON response did not match the requested schema
    #[error("Response does not match schema: {0}")]
    SchemaViolation(String),

    /// Configuration error
    #[error("Misconfiguration: {0}")]
    Misconfiguration(String),

    /// Unsupported feature or provider
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

impl LlmError {
    /// Failures worth retrying against the same provider.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::ProviderOutage(_) | Self::ProviderQuota(_) | Self::Timeout { .. }
        )
    }

    /// Contract violations by a provider that did answer. Never retried,
    /// never sent to the fallback provider, never counted by the breaker.
    #[must_use]
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::InvalidJson(_) | Self::SchemaViolation(_))
    }

    #[must_use]
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::ServiceUnavailable { .. })
    }
}

impl UserFriendlyError for LlmError {
    fn user_message(&self) -> String {
        match self {
            Self::Transport(msg) => format!("Could not reach the LLM provider: {msg}"),
            Self::Rejected { status, message } => {
                format!("The LLM provider rejected the request ({status}): {message}")
            }
            Self::ProviderAuth(msg) => format!("LLM provider authentication failed: {msg}"),
            Self::ProviderQuota(msg) => format!("LLM provider quota exceeded: {msg}"),
            Self::ProviderOutage(msg) => format!("LLM provider service outage: {msg}"),
            Self::Timeout { duration } => {
                format!("LLM request timed out after {duration:?}")
            }
            Self::ServiceUnavailable { retry_after } => format!(
                "The LLM service is temporarily unavailable. Try again in {}s.",
                retry_after.as_secs().max(1)
            ),
            Self::InvalidJson(msg) => format!("The model returned malformed JSON: {msg}"),
            Self::SchemaViolation(msg) => {
                format!("The model's answer did not have the expected shape: {msg}")
            }
            Self::Misconfiguration(msg) => format!("LLM configuration error: {msg}"),
            Self::Unsupported(msg) => format!("LLM feature not supported: {msg}"),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::ServiceUnavailable { .. } => Some(
                "Repeated provider failures opened the circuit breaker; calls are rejected until the cooldown elapses."
                    .to_string(),
            ),
            Self::Timeout { .. } => Some(
                "Timeouts occur when a provider call takes longer than the configured limit."
                    .to_string(),
            ),
            Self::ProviderAuth(_) => Some(
                "Authentication errors indicate missing or invalid API keys.".to_string(),
            ),
            Self::InvalidJson(_) | Self::SchemaViolation(_) => Some(
                "The provider answered, but not in the structure that was requested.".to_string(),
            ),
            _ => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::ProviderAuth(_) | Self::Misconfiguration(_) => vec![
                "Check that the API key environment variable named by api_key_env is set".to_string(),
                "Run 'ideaforge config' to see which provider is selected".to_string(),
            ],
            Self::ProviderQuota(_) | Self::ProviderOutage(_) | Self::ServiceUnavailable { .. } => {
                vec![
                    "Wait a minute and try again".to_string(),
                    "Configure a fallback provider with --fallback-provider".to_string(),
                ]
            }
            Self::Timeout { .. } => vec![
                "Increase the timeout with --timeout or resilience.timeout_secs".to_string(),
            ],
            _ => vec!["Run with --verbose to see detailed error information".to_string()],
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::ProviderAuth(_) | Self::Misconfiguration(_) | Self::Unsupported(_) => {
                ErrorCategory::Configuration
            }
            Self::InvalidJson(_) | Self::SchemaViolation(_) => ErrorCategory::Validation,
            _ => ErrorCategory::Provider,
        }
    }
}

/// Prompt template lookup and rendering errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("Unknown prompt template: '{0}'")]
    UnknownTemplate(String),

    #[error("Template '{template}' has unresolved placeholders: {}", .placeholders.join(", "))]
    Unresolved {
        template: String,
        placeholders: Vec<String>,
    },
}

/// Failure of one generation unit
#[derive(Error, Debug, Clone)]
pub enum UnitError {
    #[error("{unit} refused to run: {reason}")]
    InvalidInput { unit: UnitName, reason: String },

    #[error("{unit} generation failed: {reason}")]
    Generation { unit: UnitName, reason: String },
}

impl UnitError {
    #[must_use]
    pub fn unit(&self) -> UnitName {
        match self {
            Self::InvalidInput { unit, .. } | Self::Generation { unit, .. } => *unit,
        }
    }
}

/// Reasons a model-produced plan was rejected
#[derive(Error, Debug, Clone)]
pub enum PlanError {
    #[error("Planner emitted unknown unit '{0}'")]
    UnknownUnit(String),

    #[error("Planner emitted {unit} for unrequested document {document}")]
    UnrequestedDocument { unit: UnitName, document: DocumentType },

    #[error("Planner emitted {0} more than once")]
    DuplicateUnit(UnitName),

    #[error("Planner returned an empty plan")]
    EmptyPlan,

    #[error("Planned task #{index} is invalid: {reason}")]
    InvalidTask { index: usize, reason: String },

    #[error("Planning call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("Planning response is malformed: {0}")]
    Malformed(String),

    #[error("Planning prompt could not be rendered: {0}")]
    Template(#[from] TemplateError),
}

/// Fatal failure of the final assembly step
#[derive(Error, Debug, Clone)]
pub enum AssemblyError {
    #[error("Final assembly call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("Assembly prompt could not be rendered: {0}")]
    Template(#[from] TemplateError),

    #[error("Assembly response is not a filename to markdown object: {0}")]
    Malformed(String),

    #[error("Duplicate result for {0} while aggregating")]
    DuplicateResult(UnitName),
}

/// Key-value settings store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Settings store I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Settings store at {path} is corrupt: {reason}")]
    Corrupt { path: String, reason: String },

    #[error("Invalid settings key '{0}'")]
    InvalidKey(String),

    #[error("Invalid value for settings key '{key}': {value}")]
    InvalidValue { key: String, value: String },
}

impl UserFriendlyError for StoreError {
    fn user_message(&self) -> String {
        self.to_string()
    }

    fn context(&self) -> Option<String> {
        Some("Prompt overrides, unit toggles and reference docs live in the settings store.".to_string())
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Corrupt { path, .. } => vec![format!(
                "Fix or remove {path}; it will be recreated empty"
            )],
            Self::InvalidKey(_) => vec![
                "Valid keys: prompt.<Unit>, prompt.planner, prompt.assembly, unit.<Unit>.enabled, refdoc.<backend>.<Unit>".to_string(),
            ],
            _ => vec!["Check the store.path setting and its permissions".to_string()],
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Storage
    }
}

/// Top-level error for one orchestration run
#[derive(Error, Debug)]
pub enum ForgeError {
    #[error("No documents were requested")]
    NothingRequested,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("No documents were generated ({failures} task(s) failed)")]
    NoDocumentsGenerated { failures: usize },

    #[error("Final assembly failed: {0}")]
    Assembly(#[from] AssemblyError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Settings store error: {0}")]
    Store(#[from] StoreError),

    #[error("LLM backend error: {0}")]
    Llm(#[from] LlmError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl UserFriendlyError for ForgeError {
    fn user_message(&self) -> String {
        match self {
            Self::Config(err) => err.user_message(),
            Self::Store(err) => err.user_message(),
            Self::Llm(err) => err.user_message(),
            Self::Assembly(AssemblyError::Llm(err)) => {
                format!("Final assembly failed: {}", err.user_message())
            }
            other => other.to_string(),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::Config(err) => err.context(),
            Self::Store(err) => err.context(),
            Self::Llm(err) | Self::Assembly(AssemblyError::Llm(err)) => err.context(),
            Self::NoDocumentsGenerated { .. } => Some(
                "Every planned unit failed, so there was nothing to assemble.".to_string(),
            ),
            _ => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Config(err) => err.suggestions(),
            Self::Store(err) => err.suggestions(),
            Self::Llm(err) | Self::Assembly(AssemblyError::Llm(err)) => err.suggestions(),
            Self::NothingRequested => {
                vec!["Pass at least one --doc (run 'ideaforge units' for the list)".to_string()]
            }
            Self::InvalidInput(_) => {
                vec!["Provide a non-empty --idea, --framework and --backend".to_string()]
            }
            _ => vec!["Run with --verbose to see detailed error information".to_string()],
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::NothingRequested | Self::InvalidInput(_) => ErrorCategory::Validation,
            Self::NoDocumentsGenerated { .. } => ErrorCategory::Generation,
            Self::Assembly(_) => ErrorCategory::Assembly,
            Self::Config(_) => ErrorCategory::Configuration,
            Self::Store(_) => ErrorCategory::Storage,
            Self::Llm(err) => err.category(),
            Self::Internal(_) => ErrorCategory::Internal,
        }
    }
}
