//! Error types for the Mini C backend.
//!
//! Collaborator faults (assistant, indicator) are recoverable by design of
//! the request flow: handlers turn them into placeholder text or ignore
//! them. Only configuration errors and local pipeline faults stop work.

use std::path::PathBuf;

use minic_pipeline::PipelineError;

/// A specialized `Result` type for backend operations.
pub type Result<T> = std::result::Result<T, MinicError>;

/// Errors that can occur in the Mini C backend.
#[derive(Debug, thiserror::Error)]
pub enum MinicError {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Invalid JSON syntax in the configuration file.
    #[error("Invalid JSON in config file '{path}': {message}\n\nSuggestion: Validate your minic.json with a JSON linter")]
    ConfigParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Description of the parse error.
        message: String,
    },

    /// Configuration validation failed.
    #[error("Invalid configuration: {message}\n\nSuggestion: {suggestion}")]
    ConfigValidationError {
        /// Description of the validation failure.
        message: String,
        /// Actionable suggestion for the user.
        suggestion: String,
    },

    // ========================================================================
    // Pipeline Errors
    // ========================================================================
    /// A local fault prevented the pipeline from producing a verdict.
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    // ========================================================================
    // Assistant Errors
    // ========================================================================
    /// No generative-text service is configured.
    #[error("Assistant not configured: {reason}\n\nSuggestion: Set the {api_key_env} environment variable and enable the assistant in minic.json")]
    AssistantNotConfigured {
        /// Why the assistant is unavailable.
        reason: String,
        /// Environment variable expected to hold the API key.
        api_key_env: String,
    },

    /// The generative-text service returned an error.
    #[error("LLM API error ({kind}): {message}\n\nSuggestion: {suggestion}")]
    LlmApiError {
        /// The kind of API error.
        kind: LlmErrorKind,
        /// Detailed error message from the API.
        message: String,
        /// Actionable suggestion for the user.
        suggestion: String,
    },

    // ========================================================================
    // Indicator Errors
    // ========================================================================
    /// Writing to the indicator device failed.
    #[error("Indicator write to '{port}' failed: {message}\n\nSuggestion: Check the USB cable and that no other program holds the port")]
    IndicatorWrite {
        /// Serial port that was written to.
        port: String,
        /// Description of the failure.
        message: String,
    },
}

/// Categories of LLM API errors for structured error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmErrorKind {
    /// Authentication failure (invalid API key, expired credentials).
    Authentication,
    /// Rate limit exceeded.
    RateLimit,
    /// Server error (5xx responses).
    Server,
    /// Network connectivity issues.
    Network,
    /// Other unclassified errors.
    Other,
}

impl std::fmt::Display for LlmErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Authentication => write!(f, "authentication"),
            Self::RateLimit => write!(f, "rate_limit"),
            Self::Server => write!(f, "server"),
            Self::Network => write!(f, "network"),
            Self::Other => write!(f, "other"),
        }
    }
}

impl LlmErrorKind {
    /// Categorizes an HTTP status code returned by the service.
    #[must_use]
    pub const fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => Self::Authentication,
            429 => Self::RateLimit,
            500..=599 => Self::Server,
            _ => Self::Other,
        }
    }

    /// Returns a suggestion message for this error kind.
    #[must_use]
    pub const fn suggestion(&self) -> &'static str {
        match self {
            Self::Authentication => "Check your API key or credentials",
            Self::RateLimit => "Wait and retry, or reduce request frequency",
            Self::Server => "Retry later; the LLM service may be experiencing issues",
            Self::Network => "Check your network connection",
            Self::Other => "Check the LLM provider's status page",
        }
    }
}

impl MinicError {
    /// Creates a new `ConfigParseError` with the given path and message.
    #[must_use]
    pub fn config_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConfigParseError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `ConfigValidationError` with the given message and suggestion.
    #[must_use]
    pub fn config_validation(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::ConfigValidationError {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Creates a new `AssistantNotConfigured` error.
    #[must_use]
    pub fn assistant_not_configured(
        reason: impl Into<String>,
        api_key_env: impl Into<String>,
    ) -> Self {
        Self::AssistantNotConfigured {
            reason: reason.into(),
            api_key_env: api_key_env.into(),
        }
    }

    /// Creates a new `LlmApiError` with automatic suggestion based on error kind.
    #[must_use]
    pub fn llm_api_error(kind: LlmErrorKind, message: impl Into<String>) -> Self {
        let suggestion = kind.suggestion().to_string();
        Self::LlmApiError {
            kind,
            message: message.into(),
            suggestion,
        }
    }

    /// Creates a new `IndicatorWrite` error.
    #[must_use]
    pub fn indicator_write(port: impl Into<String>, message: impl Into<String>) -> Self {
        Self::IndicatorWrite {
            port: port.into(),
            message: message.into(),
        }
    }

    /// Returns `true` if this error is transient and may be retried.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::LlmApiError {
                kind: LlmErrorKind::RateLimit | LlmErrorKind::Server | LlmErrorKind::Network,
                ..
            } | Self::IndicatorWrite { .. }
        )
    }
}
