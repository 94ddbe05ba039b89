//! Error type for the embedding capability and the similarity index.

use helpdesk_core::error::HelpdeskError;

/// Failures of the external embedding call or of the data it returned.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EmbeddingError {
    #[error("embedding client misconfigured: {0}")]
    Configuration(String),
    #[error("embedding request failed: {0}")]
    Request(String),
    #[error("embedding provider returned {actual} vectors for {expected} inputs")]
    CountMismatch { expected: usize, actual: usize },
    #[error("embedding has {actual} dimensions, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("embedding provider returned no vectors")]
    EmptyResponse,
    #[error("embedding request timed out after {0} seconds")]
    Timeout(u64),
}

impl From<EmbeddingError> for HelpdeskError {
    fn from(err: EmbeddingError) -> Self {
        HelpdeskError::Embedding(err.to_string())
    }
}
