//! Error types for the dialog controller and its capabilities.

use helpdesk_core::error::HelpdeskError;
use helpdesk_vector::error::EmbeddingError;

/// Failures of the chat-completion capability.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompletionError {
    #[error("completion client misconfigured: {0}")]
    Configuration(String),
    #[error("completion request failed: {0}")]
    Request(String),
    #[error("completion returned no content")]
    EmptyResponse,
    #[error("completion request timed out after {0} seconds")]
    Timeout(u64),
}

impl From<CompletionError> for HelpdeskError {
    fn from(err: CompletionError) -> Self {
        HelpdeskError::Completion(err.to_string())
    }
}

/// Failures of the human-handoff intent check. Never surfaced to callers.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClassificationError {
    #[error("intent classification failed: {0}")]
    Completion(#[from] CompletionError),
    #[error("unparseable classifier reply: {0:?}")]
    Unparseable(String),
    #[error("intent classification timed out after {0} seconds")]
    Timeout(u64),
}

/// The only failures a turn can report. The caller still receives an
/// apology reply alongside it.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TurnFailure {
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
    #[error(transparent)]
    Completion(#[from] CompletionError),
}

impl TurnFailure {
    /// Short machine-readable kind used in API responses.
    pub fn kind(&self) -> &'static str {
        match self {
            TurnFailure::Embedding(_) => "embedding",
            TurnFailure::Completion(_) => "completion",
        }
    }
}
