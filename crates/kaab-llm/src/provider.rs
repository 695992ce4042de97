//! # Generative model trait
//!
//! The assistant only needs "turns in, text out". Providers translate a
//! [`GenerationRequest`] into their wire format and return the first
//! candidate's text.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Result alias for provider calls.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Errors from a generative model call.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Transport failure. The request URL is stripped.
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    /// Body could not be encoded or decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Provider answered with a non-success status.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error description from the provider.
        message: String,
        /// Provider-specific status string, e.g. `INVALID_ARGUMENT`.
        code: Option<String>,
    },

    /// Well-formed response without usable text.
    #[error("invalid response: {message}")]
    InvalidResponse {
        /// What was missing.
        message: String,
    },

    /// No answer within the deadline.
    #[error("model call timed out after {after_ms}ms")]
    Timeout {
        /// Deadline that elapsed.
        after_ms: u64,
    },

    /// Anything else.
    #[error("{message}")]
    Other {
        /// Error description.
        message: String,
    },
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.without_url())
    }
}

impl ProviderError {
    /// Short category label for logs and metrics.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Http(_) => "network",
            Self::Json(_) | Self::InvalidResponse { .. } => "parse",
            Self::Api { status, .. } if *status == 401 || *status == 403 => "auth",
            Self::Api { .. } => "api",
            Self::Timeout { .. } => "timeout",
            Self::Other { .. } => "unknown",
        }
    }
}

/// Role vocabulary of the model protocol.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelRole {
    /// Human side of the conversation.
    User,
    /// The model's own replies.
    Model,
}

/// One turn submitted to the model.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelTurn {
    /// Speaker.
    pub role: ModelRole,
    /// Text.
    pub text: String,
}

impl ModelTurn {
    /// A user turn.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ModelRole::User,
            text: text.into(),
        }
    }

    /// A model turn.
    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: ModelRole::Model,
            text: text.into(),
        }
    }
}

/// Sampling parameters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Sampling temperature.
    pub temperature: f64,
    /// Nucleus sampling mass.
    pub top_p: f64,
    /// Top-k cutoff.
    pub top_k: u32,
    /// Output length cap.
    pub max_output_tokens: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.8,
            top_k: 40,
            max_output_tokens: 1000,
        }
    }
}

/// A complete request: ordered turns plus sampling parameters.
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Conversation, oldest first.
    pub turns: Vec<ModelTurn>,
    /// Sampling parameters.
    pub params: GenerationParams,
}

/// A text-generating model.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Model identifier, for logs.
    fn model(&self) -> &str;

    /// Generate a reply to `request`.
    async fn generate(&self, request: &GenerationRequest) -> ProviderResult<String>;
}
