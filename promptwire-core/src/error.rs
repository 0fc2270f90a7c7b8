//! Crate-level error type returned by the LLM abstraction

use crate::config::ConfigError;
use crate::providers::error::ProviderError;
use thiserror::Error;

/// Result type for LLM operations
pub type LlmResult<T> = Result<T, LlmError>;

/// Errors surfaced to callers of [`crate::providers::Llm`]
#[derive(Debug, Error)]
pub enum LlmError {
    /// A provider backend is not compiled in or could not be initialized
    #[error("Provider '{provider}' is not installed: {reason}")]
    NotInstalled { provider: String, reason: String },

    /// The request itself is unusable (e.g. no messages)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Every attempt failed with a retryable error; `source` is the last one
    #[error("Provider unavailable after {attempts} attempts: {source}")]
    ProviderUnavailable { attempts: u32, source: ProviderError },

    /// Non-retryable provider failure, surfaced on first occurrence
    #[error("Provider request failed: {0}")]
    Provider(#[from] ProviderError),

    /// The call was cancelled while waiting to retry
    #[error("Request cancelled after {attempts} attempts")]
    Cancelled { attempts: u32 },

    /// Tool-call arguments could not be parsed
    #[error("Malformed arguments for tool '{tool}': {message}")]
    MalformedArguments { tool: String, message: String },

    /// A tool call names a tool that was not declared for the request
    #[error("Tool '{0}' is not among the declared tools")]
    UnresolvedTool(String),

    /// The tool's executable returned an error
    #[error("Tool '{tool}' failed: {message}")]
    ToolExecution { tool: String, message: String },

    /// Configuration could not be loaded or validated
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl LlmError {
    /// The underlying provider error, if this failure came from a provider call
    pub fn provider_error(&self) -> Option<&ProviderError> {
        match self {
            LlmError::ProviderUnavailable { source, .. } => Some(source),
            LlmError::Provider(e) => Some(e),
            _ => None,
        }
    }
}
