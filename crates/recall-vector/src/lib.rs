//! Recall Vector Index - namespaced vector storage and similarity search
//!
//! This crate provides:
//! - `VectorIndex` trait for abstracting vector index backends
//! - In-memory index for tests and single-node deployments
//! - Qdrant integration (optional, feature-gated)
//! - Batched upserts that respect backend write limits

pub mod batch;
pub mod error;
pub mod index;
#[cfg(feature = "qdrant")]
pub mod qdrant;
pub mod types;

pub use batch::{upsert_batched, UpsertBatching};
pub use error::{VectorError, VectorResult};
pub use index::{validate_query, InMemoryVectorIndex, VectorIndex};
pub use types::{cosine_similarity, IndexMatch, IndexQuery, IndexRecord, RecordFilter, RecordMetadata};

#[cfg(feature = "qdrant")]
pub use qdrant::{QdrantConfig, QdrantVectorIndex};

/// Prelude for common imports
pub mod prelude {
    pub use crate::error::{VectorError, VectorResult};
    pub use crate::index::VectorIndex;
    pub use crate::types::{IndexMatch, IndexQuery, IndexRecord, RecordFilter, RecordMetadata};
    pub use recall_core::Namespace;
}
