//! Generation gateway types - progress events and errors

use reqwest::StatusCode;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

/// Progress notification emitted while a backend is generating. The token
/// count is monotonically non-decreasing within one generation call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GenerationProgress {
    pub tokens: u64,
    pub tokens_per_second: Option<f64>,
}

/// Fire-and-forget progress callback handed to a backend for the duration of
/// one generation call.
pub type ProgressSink = Arc<dyn Fn(GenerationProgress) + Send + Sync>;

/// Generation backend errors
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("backend '{backend}' requires an API key")]
    MissingApiKey { backend: String },
    #[error("model '{model}' is not available on backend '{backend}'")]
    ModelNotFound { backend: String, model: String },
    #[error("network error calling backend '{backend}': {source}")]
    Network {
        backend: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("backend '{backend}' returned an invalid response: {reason}")]
    InvalidResponse { backend: String, reason: String },
}

impl GenerationError {
    pub fn missing_api_key(backend: impl Into<String>) -> Self {
        Self::MissingApiKey {
            backend: backend.into(),
        }
    }

    pub fn model_not_found(backend: impl Into<String>, model: impl Into<String>) -> Self {
        Self::ModelNotFound {
            backend: backend.into(),
            model: model.into(),
        }
    }

    pub fn network(backend: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            backend: backend.into(),
            source,
        }
    }

    pub fn invalid_response(backend: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            backend: backend.into(),
            reason: reason.into(),
        }
    }

    /// User-facing rendering without the source chain.
    pub fn user_message(&self) -> String {
        match self {
            GenerationError::MissingApiKey { backend } => {
                format!("Backend '{backend}' requires an API key.")
            }
            GenerationError::ModelNotFound { backend, model } => {
                format!("Model '{model}' is not available on '{backend}'.")
            }
            GenerationError::Network { backend, source } => {
                if source.is_connect() {
                    format!("Could not connect to the model backend '{backend}'.")
                } else if source.is_timeout() {
                    format!("The request to '{backend}' timed out.")
                } else if let Some(status) = source.status() {
                    match status {
                        StatusCode::NOT_FOUND => {
                            format!("The endpoint for '{backend}' was not found.")
                        }
                        StatusCode::SERVICE_UNAVAILABLE | StatusCode::BAD_GATEWAY => {
                            format!("The backend '{backend}' is currently unavailable.")
                        }
                        _ => format!("Request to '{backend}' failed: {}", status.as_u16()),
                    }
                } else {
                    format!("Network error while calling '{backend}'.")
                }
            }
            GenerationError::InvalidResponse { backend, .. } => {
                format!("The response from '{backend}' could not be read.")
            }
        }
    }
}
