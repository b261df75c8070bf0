//! Error types for vox-agent.

pub mod unified;

pub use unified::{ErrorCategory, ErrorImpact};

use thiserror::Error;

/// Primary error type for all agent operations.
#[derive(Error, Debug)]
pub enum VoxError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Provider connection error: {provider}: {message}")]
    ProviderConnection { provider: String, message: String },

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Provider unavailable: {provider} (tool {tool})")]
    ProviderUnavailable { provider: String, tool: String },

    #[error("Argument parse error for {tool_name}: {message}")]
    ToolArgumentParse { tool_name: String, message: String },

    #[error("Tool execution error: {tool_name}: {message}")]
    ToolExecution { tool_name: String, message: String },

    #[error("Ranking backend error: {0}")]
    RankingBackend(String),

    #[error("Summarization error: {0}")]
    Summarization(String),

    #[error("Completion call failed: {0}")]
    CompletionCall(String),

    #[error("Turn exceeded {limit} model calls without a final answer")]
    MaxIterationsExceeded { limit: usize },

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl VoxError {
    /// Create an API error.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::ProviderConnection { .. } => ErrorCategory::ProviderConnection,
            Self::ToolNotFound(_)
            | Self::ProviderUnavailable { .. }
            | Self::ToolArgumentParse { .. } => ErrorCategory::ToolDispatch,
            Self::ToolExecution { .. } => ErrorCategory::ToolExecution,
            Self::RankingBackend(_) => ErrorCategory::Ranking,
            Self::Summarization(_) => ErrorCategory::Summarization,
            Self::CompletionCall(_) | Self::MaxIterationsExceeded { .. } => {
                ErrorCategory::Completion
            }
            Self::Network(_) => ErrorCategory::Network,
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::Serialization(_) => ErrorCategory::Serialization,
            Self::Api { status, .. } => match status {
                429 => ErrorCategory::RateLimit,
                500..=599 => ErrorCategory::Server,
                _ => ErrorCategory::Api,
            },
            _ => ErrorCategory::Unknown,
        }
    }

    /// How far this error propagates.
    pub fn impact(&self) -> ErrorImpact {
        match self.category() {
            ErrorCategory::Configuration => ErrorImpact::Fatal,
            ErrorCategory::ProviderConnection
            | ErrorCategory::ToolDispatch
            | ErrorCategory::ToolExecution
            | ErrorCategory::Ranking
            | ErrorCategory::Summarization => ErrorImpact::Recoverable,
            _ => ErrorImpact::TurnFatal,
        }
    }

    /// Whether this error is potentially retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::RateLimit
                | ErrorCategory::Network
                | ErrorCategory::Timeout
                | ErrorCategory::Server
        )
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, VoxError>;
