//! Errors raised by external collaborators.

use thiserror::Error;

/// Failure of an external store the core talks to.
///
/// The core never retries these; they are surfaced to the caller of the
/// operation that needed the collaborator.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    /// The store could not be reached.
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),

    /// The store answered with data the core cannot use.
    #[error("invalid collaborator response: {0}")]
    InvalidResponse(String),

    /// The request was rejected by the store.
    #[error("collaborator rejected request: {0}")]
    Rejected(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_detail() {
        let err = CollaboratorError::Unavailable("connection refused".into());
        assert_eq!(err.to_string(), "collaborator unavailable: connection refused");
    }
}
