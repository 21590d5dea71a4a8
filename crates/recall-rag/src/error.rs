//! Error types for retrieval and answer synthesis

use recall_runtime::{EmbeddingError, ProviderError};
use recall_vector::VectorError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Persona directory error: {0}")]
    Directory(String),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    VectorIndex(#[from] VectorError),

    #[error("Answer generation failed: {0}")]
    Generation(#[from] ProviderError),
}

impl RagError {
    /// Short label used for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            RagError::InvalidQuery(_) => "invalid_query",
            RagError::Directory(_) => "persona_directory",
            RagError::Embedding(_) => "embedding",
            RagError::VectorIndex(_) => "vector_index",
            RagError::Generation(_) => "generation",
        }
    }
}

pub type RagResult<T> = Result<T, RagError>;
