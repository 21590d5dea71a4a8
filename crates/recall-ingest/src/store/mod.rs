//! Source-of-truth document store and the embedding status tracker.
//!
//! The ingestion side records the metadata carried by change events and
//! writes the `embedding_status` field; everything else belongs to the
//! application.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use recall_core::{Document, EmbeddingStatus};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{IngestError, IngestResult};

#[cfg(feature = "persistence-sqlx")]
pub mod postgres;

#[cfg(feature = "persistence-sqlx")]
pub use postgres::PostgresDocumentStore;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get_document(&self, id: Uuid) -> IngestResult<Option<Document>>;

    /// Record `document` as delivered by a change event. A known row gets its
    /// metadata refreshed but keeps its stored `embedding_status`.
    async fn register_document(&self, document: &Document) -> IngestResult<()>;

    /// Write the status field only. Transition rules are enforced by
    /// [`StatusTracker`], not here.
    async fn set_embedding_status(&self, id: Uuid, status: EmbeddingStatus) -> IngestResult<()>;
}

/// In-memory document store that also keeps every status write.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDocumentStore {
    documents: Arc<RwLock<HashMap<Uuid, Document>>>,
    status_writes: Arc<RwLock<HashMap<Uuid, Vec<EmbeddingStatus>>>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, document: Document) {
        self.documents.write().await.insert(document.id, document);
    }

    pub async fn remove(&self, id: Uuid) -> Option<Document> {
        self.documents.write().await.remove(&id)
    }

    pub async fn status(&self, id: Uuid) -> Option<EmbeddingStatus> {
        self.documents.read().await.get(&id).map(|doc| doc.embedding_status)
    }

    /// Statuses written for `id`, oldest first.
    pub async fn status_history(&self, id: Uuid) -> Vec<EmbeddingStatus> {
        self.status_writes
            .read()
            .await
            .get(&id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get_document(&self, id: Uuid) -> IngestResult<Option<Document>> {
        Ok(self.documents.read().await.get(&id).cloned())
    }

    async fn register_document(&self, document: &Document) -> IngestResult<()> {
        let mut documents = self.documents.write().await;
        let status = documents
            .get(&document.id)
            .map_or(document.embedding_status, |known| known.embedding_status);
        documents.insert(
            document.id,
            Document {
                embedding_status: status,
                ..document.clone()
            },
        );
        Ok(())
    }

    async fn set_embedding_status(&self, id: Uuid, status: EmbeddingStatus) -> IngestResult<()> {
        let mut documents = self.documents.write().await;
        let document = documents.get_mut(&id).ok_or(IngestError::DocumentNotFound(id))?;
        document.embedding_status = status;
        self.status_writes
            .write()
            .await
            .entry(id)
            .or_default()
            .push(status);
        Ok(())
    }
}

/// Moves documents through their embedding lifecycle, rejecting transitions
/// the lifecycle does not allow.
#[derive(Clone)]
pub struct StatusTracker {
    store: Arc<dyn DocumentStore>,
}

impl StatusTracker {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Make sure the store knows `document` before its status is tracked.
    pub async fn register(&self, document: &Document) -> IngestResult<()> {
        self.store.register_document(document).await?;
        debug!(document_id = %document.id, "Document registered");
        Ok(())
    }

    pub async fn current(&self, id: Uuid) -> IngestResult<EmbeddingStatus> {
        self.store
            .get_document(id)
            .await?
            .map(|doc| doc.embedding_status)
            .ok_or(IngestError::DocumentNotFound(id))
    }

    /// Validate and persist `next`. Returns the status it replaced.
    pub async fn transition(&self, id: Uuid, next: EmbeddingStatus) -> IngestResult<EmbeddingStatus> {
        let current = self.current(id).await?;
        current.transition(next)?;
        self.store.set_embedding_status(id, next).await?;

        if next.is_terminal() {
            info!(document_id = %id, from = %current, to = %next, "Document embedding status changed");
        } else {
            debug!(document_id = %id, from = %current, to = %next, "Document embedding status changed");
        }
        Ok(current)
    }

    pub async fn mark_processing(&self, id: Uuid) -> IngestResult<EmbeddingStatus> {
        self.transition(id, EmbeddingStatus::Processing).await
    }

    pub async fn mark_completed(&self, id: Uuid) -> IngestResult<EmbeddingStatus> {
        self.transition(id, EmbeddingStatus::Completed).await
    }

    pub async fn mark_failed(&self, id: Uuid) -> IngestResult<EmbeddingStatus> {
        self.transition(id, EmbeddingStatus::Failed).await
    }
}
