//! Error types for the flow engine

use thiserror::Error;

use crate::expression::ExprError;

/// Result type alias using FlowEngineError
pub type Result<T> = std::result::Result<T, FlowEngineError>;

/// Errors that can occur in the flow engine
#[derive(Debug, Error)]
pub enum FlowEngineError {
    /// Script or condition failed to parse or evaluate
    #[error("Expression error: {0}")]
    Expression(#[from] ExprError),

    /// Outbound HTTP call failed at the transport level
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// HTTP response body could not be parsed
    #[error("Failed to parse response from {url}: {message}")]
    ResponseParse { url: String, message: String },

    /// Invalid engine configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for FlowEngineError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.to_string())
    }
}
