//! Error types for the breakdown backend and on-device generation

use thiserror::Error;

use crate::types::{ApiErrorBody, ApiErrorEnvelope};

/// Errors surfaced by the AI backend client
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Cloud AI is disabled; consent required")]
    ConsentRequired,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("HTTP {status}: {body}")]
    StatusCode { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl BackendError {
    /// Check if the server rejected the session token
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, BackendError::StatusCode { status: 401, .. })
    }

    /// HTTP status for status errors
    pub fn status(&self) -> Option<u16> {
        match self {
            BackendError::StatusCode { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Decode the backend error envelope from a status error body
    pub fn api_error(&self) -> Option<ApiErrorBody> {
        match self {
            BackendError::StatusCode { body, .. } => serde_json::from_str::<ApiErrorEnvelope>(body)
                .ok()
                .map(|envelope| envelope.error),
            _ => None,
        }
    }
}

impl From<TransportError> for BackendError {
    fn from(err: TransportError) -> Self {
        BackendError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        BackendError::InvalidResponse(err.to_string())
    }
}

/// Errors raised when no HTTP response could be obtained
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// Errors raised by the on-device breakdown capability
#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
