//! Error types for the vector index

use recall_core::Namespace;
use thiserror::Error;

/// Vector index error type
#[derive(Error, Debug)]
pub enum VectorError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Invalid vector dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },

    #[error("Query against namespace '{namespace}' must be scoped to an owner")]
    MissingOwnerFilter { namespace: Namespace },

    #[error("Record {id} belongs to namespace '{actual}', not '{expected}'")]
    NamespaceMismatch {
        id: uuid::Uuid,
        expected: Namespace,
        actual: Namespace,
    },

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("{backend} backend error: {message}")]
    Backend { backend: &'static str, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl VectorError {
    pub fn backend(backend: &'static str, message: impl Into<String>) -> Self {
        VectorError::Backend {
            backend,
            message: message.into(),
        }
    }

    pub fn invalid_dimension(expected: usize, actual: usize) -> Self {
        VectorError::InvalidDimension { expected, actual }
    }
}

/// Result type for vector operations
pub type VectorResult<T> = Result<T, VectorError>;
