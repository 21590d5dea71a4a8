//! Recall ingestion - turns change events into searchable vectors.
//!
//! This crate provides:
//! - Blob stores holding uploaded document bytes
//! - The document processor (format detection, text extraction, windowing)
//! - The document store seam and embedding status tracker
//! - The indexing pipeline consuming message and document change events

pub mod blob;
pub mod error;
pub mod pipeline;
pub mod processor;
pub mod store;

pub use blob::{BlobStore, HttpBlobStore, InMemoryBlobStore, LocalBlobStore};
pub use error::{IngestError, IngestResult};
pub use pipeline::{IndexOutcome, IndexingPipeline, ReadinessConfig};
pub use processor::{ChunkConfig, DocumentFormat, DocumentProcessor, ProcessedDocument, ProcessedMetadata};
pub use store::{DocumentStore, InMemoryDocumentStore, StatusTracker};

#[cfg(feature = "persistence-sqlx")]
pub use store::PostgresDocumentStore;

/// Prelude for common imports
pub mod prelude {
    pub use crate::error::{IngestError, IngestResult};
    pub use crate::pipeline::{IndexOutcome, IndexingPipeline};
    pub use crate::processor::DocumentProcessor;
    pub use crate::store::{DocumentStore, StatusTracker};
}
