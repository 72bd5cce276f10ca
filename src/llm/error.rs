//! LLM error types.

use thiserror::Error;

/// Error from LLM API calls.
///
/// None of these are retried; they surface to the HTTP caller as a server error.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Connection failure or timeout
    #[error("network error: {0}")]
    Network(String),

    /// Non-success HTTP status from the provider
    #[error("provider returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Response body could not be understood
    #[error("failed to parse provider response: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LlmError::Network(format!("Request timeout: {}", e))
        } else if e.is_connect() {
            LlmError::Network(format!("Connection failed: {}", e))
        } else {
            LlmError::Network(format!("Request failed: {}", e))
        }
    }
}
