//! Error types for ingestion

use recall_core::{EventError, StatusTransitionError};
use recall_runtime::EmbeddingError;
use recall_vector::VectorError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Unsupported document format: {mime_type}")]
    UnsupportedFormat { mime_type: String },

    #[error("Failed to extract text from document {document_id}: {reason}")]
    Extraction { document_id: Uuid, reason: String },

    #[error("Document not found: {0}")]
    DocumentNotFound(Uuid),

    #[error("Blob store error for '{path}': {reason}")]
    Blob { path: String, reason: String },

    #[error("Document store error: {0}")]
    Store(String),

    #[error(transparent)]
    InvalidTransition(#[from] StatusTransitionError),

    #[error(transparent)]
    InvalidEvent(#[from] EventError),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    VectorIndex(#[from] VectorError),
}

impl IngestError {
    pub fn blob(path: impl Into<String>, reason: impl ToString) -> Self {
        IngestError::Blob {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn extraction(document_id: Uuid, reason: impl ToString) -> Self {
        IngestError::Extraction {
            document_id,
            reason: reason.to_string(),
        }
    }

    /// Short label used for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            IngestError::UnsupportedFormat { .. } => "unsupported_format",
            IngestError::Extraction { .. } => "extraction",
            IngestError::DocumentNotFound(_) => "not_found",
            IngestError::Blob { .. } => "blob",
            IngestError::Store(_) => "store",
            IngestError::InvalidTransition(_) => "invalid_transition",
            IngestError::InvalidEvent(_) => "invalid_event",
            IngestError::Embedding(_) => "embedding",
            IngestError::VectorIndex(_) => "vector_index",
        }
    }
}

pub type IngestResult<T> = Result<T, IngestError>;
