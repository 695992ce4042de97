//! Response engine errors.

use std::sync::Arc;

use kaab_core::CollaboratorError;
use kaab_llm::ProviderError;
use thiserror::Error;

/// Why a response could not be produced.
///
/// `Clone` so one in-flight result can be handed to every waiter on the same
/// fingerprint.
#[derive(Clone, Debug, Error)]
pub enum EngineError {
    /// Empty history, or the last turn is not from the user.
    #[error("invalid input: {0}")]
    Input(String),

    /// The entity store or the generative model failed.
    #[error("upstream failure: {source}")]
    Upstream {
        /// Original cause.
        #[source]
        source: Arc<UpstreamCause>,
    },

    /// No generative model credential is configured.
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Collaborator failure behind [`EngineError::Upstream`].
#[derive(Debug, Error)]
pub enum UpstreamCause {
    /// Generative model.
    #[error("model: {0}")]
    Model(#[from] ProviderError),
    /// Entity store.
    #[error("entity store: {0}")]
    Store(#[from] CollaboratorError),
}

impl EngineError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Input(_) => "invalid_input",
            Self::Upstream { .. } => "upstream_error",
            Self::Configuration(_) => "configuration_error",
        }
    }
}

impl From<ProviderError> for EngineError {
    fn from(err: ProviderError) -> Self {
        Self::Upstream {
            source: Arc::new(UpstreamCause::Model(err)),
        }
    }
}

impl From<CollaboratorError> for EngineError {
    fn from(err: CollaboratorError) -> Self {
        Self::Upstream {
            source: Arc::new(UpstreamCause::Store(err)),
        }
    }
}
