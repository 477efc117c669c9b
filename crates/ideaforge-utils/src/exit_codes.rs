//! Exit codes for the `ideaforge` binary and the mapping from [`ForgeError`].
//!
//! # Exit Code Table
//!
//! | Code | Constant | Description |
//! |------|----------|-------------|
//! | 0 | `SUCCESS` | Every requested document was produced |
//! | 1 | `INTERNAL` | General/internal failure |
//! | 2 | `CLI_ARGS` | Invalid CLI arguments, input or configuration |
//! | 3 | `PARTIAL` | Bundle produced but some requested documents are missing |
//! | 4 | `PROVIDER_FAILURE` | Provider failure or final assembly failure |
//! | 5 | `SERVICE_UNAVAILABLE` | Circuit breaker open, no call attempted |

use crate::error::{AssemblyError, ForgeError, LlmError};

/// Process exit code.
///
/// ```rust
/// use ideaforge_utils::exit_codes::ExitCode;
///
/// assert_eq!(ExitCode::PARTIAL.as_i32(), 3);
/// assert_eq!(ExitCode::SUCCESS, ExitCode::from_i32(0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(i32);

impl ExitCode {
    /// Success - every requested document was produced
    pub const SUCCESS: ExitCode = ExitCode(0);

    /// Internal error - general failure
    pub const INTERNAL: ExitCode = ExitCode(1);

    /// CLI arguments error - invalid arguments, input or configuration
    pub const CLI_ARGS: ExitCode = ExitCode(2);

    /// Partial success - the bundle is missing some requested documents
    pub const PARTIAL: ExitCode = ExitCode(3);

    /// Provider failure - generation or final assembly could not complete
    pub const PROVIDER_FAILURE: ExitCode = ExitCode(4);

    /// Service unavailable - the circuit breaker rejected the call
    pub const SERVICE_UNAVAILABLE: ExitCode = ExitCode(5);

    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0
    }

    #[must_use]
    pub const fn from_i32(code: i32) -> Self {
        ExitCode(code)
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code.0
    }
}

impl ForgeError {
    /// Exit code the CLI reports for this error.
    #[must_use]
    pub fn to_exit_code(&self) -> ExitCode {
        match self {
            Self::NothingRequested | Self::InvalidInput(_) | Self::Config(_) => ExitCode::CLI_ARGS,
            Self::Store(_) | Self::Internal(_) => ExitCode::INTERNAL,
            Self::NoDocumentsGenerated { .. } => ExitCode::PROVIDER_FAILURE,
            Self::Llm(err) | Self::Assembly(AssemblyError::Llm(err)) => llm_exit_code(err),
            Self::Assembly(_) => ExitCode::PROVIDER_FAILURE,
        }
    }
}

fn llm_exit_code(err: &LlmError) -> ExitCode {
    match err {
        LlmError::ServiceUnavailable { .. } => ExitCode::SERVICE_UNAVAILABLE,
        LlmError::Misconfiguration(_) | LlmError::Unsupported(_) => ExitCode::CLI_ARGS,
        _ => ExitCode::PROVIDER_FAILURE,
    }
}
