//! Error types for the completion client

use thiserror::Error;

/// Completion client error types
#[derive(Error, Debug)]
pub enum AiError {
    #[error("LLM error: {0}")]
    Llm(String),

    #[error("{provider} API error ({status}): {message}")]
    LlmHttp {
        provider: String,
        status: u16,
        message: String,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl AiError {
    /// HTTP status reported by the provider, if the error came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            AiError::LlmHttp { status, .. } => Some(*status),
            AiError::Http(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Result type alias for completion client operations
pub type Result<T> = std::result::Result<T, AiError>;
