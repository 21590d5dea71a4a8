//! Indexing pipeline: change events in, vector index and status updates out.
//!
//! Every handler runs to completion before the event is acknowledged and is
//! safe to replay: upserts overwrite by id and deletes of missing ids succeed.
//! Concurrent Update and Delete events for the same id are not serialized
//! here; the index keeps whichever write lands last.

use std::sync::Arc;
use std::time::Duration;

use recall_core::{with_retry, ChangeEvent, Document, EventType, Message, Namespace, RetryConfig};
use recall_runtime::{Embedder, EmbeddingError};
use recall_vector::{upsert_batched, IndexRecord, RecordMetadata, UpsertBatching, VectorIndex};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{IngestError, IngestResult};
use crate::processor::DocumentProcessor;
use crate::store::StatusTracker;

/// Bounded wait for a write to become visible to queries.
#[derive(Debug, Clone)]
pub struct ReadinessConfig {
    /// Total visibility checks; 0 skips the wait
    pub attempts: usize,
    /// Pause between checks
    pub delay: Duration,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            attempts: 5,
            delay: Duration::from_millis(200),
        }
    }
}

impl ReadinessConfig {
    pub fn disabled() -> Self {
        Self {
            attempts: 0,
            delay: Duration::ZERO,
        }
    }

    fn retry_config(&self) -> RetryConfig {
        RetryConfig::constant(self.attempts.saturating_sub(1), self.delay)
    }
}

/// What a handled event did to the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOutcome {
    Indexed(Uuid),
    Removed(Uuid),
    Ignored(Uuid),
}

impl IndexOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexOutcome::Indexed(_) => "indexed",
            IndexOutcome::Removed(_) => "removed",
            IndexOutcome::Ignored(_) => "ignored",
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            IndexOutcome::Indexed(id) | IndexOutcome::Removed(id) | IndexOutcome::Ignored(id) => *id,
        }
    }
}

#[derive(Clone)]
pub struct IndexingPipeline {
    processor: DocumentProcessor,
    embedder: Embedder,
    index: Arc<dyn VectorIndex>,
    tracker: StatusTracker,
    upsert_batching: UpsertBatching,
    readiness: ReadinessConfig,
}

impl IndexingPipeline {
    pub fn new(
        processor: DocumentProcessor,
        embedder: Embedder,
        index: Arc<dyn VectorIndex>,
        tracker: StatusTracker,
    ) -> Self {
        Self {
            processor,
            embedder,
            index,
            tracker,
            upsert_batching: UpsertBatching::default(),
            readiness: ReadinessConfig::default(),
        }
    }

    pub fn with_upsert_batching(mut self, upsert_batching: UpsertBatching) -> Self {
        self.upsert_batching = upsert_batching;
        self
    }

    pub fn with_readiness(mut self, readiness: ReadinessConfig) -> Self {
        self.readiness = readiness;
        self
    }

    /// Create and Update both (re)write the record in place; the old vector
    /// stays searchable until the new one has been embedded.
    pub async fn handle_message_event(&self, event: ChangeEvent<Message>) -> IngestResult<IndexOutcome> {
        match event.event_type {
            EventType::Create | EventType::Update => {
                let message = event.current()?;
                self.index_message(message, event.event_type).await
            }
            EventType::Delete => {
                let message = event.subject()?;
                self.remove(Namespace::Messages, message.id).await
            }
        }
    }

    pub async fn handle_document_event(&self, event: ChangeEvent<Document>) -> IngestResult<IndexOutcome> {
        match event.event_type {
            EventType::Create => {
                let document = event.current()?;
                self.tracker.register(document).await?;
                self.index_document(document.id).await
            }
            EventType::Update => {
                let document = event.current()?;
                let changed = event
                    .previous_record
                    .as_ref()
                    .map_or(true, |previous| previous.content_changed(document));
                if !changed {
                    debug!(document_id = %document.id, "Document update does not touch indexed content");
                    return Ok(IndexOutcome::Ignored(document.id));
                }
                self.tracker.register(document).await?;
                self.index_document(document.id).await
            }
            EventType::Delete => {
                let document = event.subject()?;
                self.remove(Namespace::AvatarDocuments, document.id).await
            }
        }
    }

    /// Run a document through the pipeline again, whatever its current
    /// status.
    pub async fn reprocess_document(&self, document_id: Uuid) -> IngestResult<IndexOutcome> {
        info!(document_id = %document_id, "Re-processing document on request");
        self.index_document(document_id).await
    }

    async fn index_message(&self, message: &Message, event_type: EventType) -> IngestResult<IndexOutcome> {
        if message.content.trim().is_empty() {
            // Nothing left to search; an edit that blanked the text drops the record.
            if event_type == EventType::Update {
                return self.remove(Namespace::Messages, message.id).await;
            }
            debug!(message_id = %message.id, "Skipping message without text");
            return Ok(IndexOutcome::Ignored(message.id));
        }

        let vector = self.embed_one(&message.content).await?;
        let record = IndexRecord::new(
            message.id,
            Namespace::Messages,
            vector,
            RecordMetadata::for_message(message),
        );
        upsert_batched(self.index.as_ref(), Namespace::Messages, vec![record], &self.upsert_batching).await?;
        self.await_visibility(Namespace::Messages, message.id, true).await;

        info!(
            message_id = %message.id,
            channel_id = %message.channel_id,
            event = %event_type,
            "Message indexed"
        );
        Ok(IndexOutcome::Indexed(message.id))
    }

    async fn index_document(&self, document_id: Uuid) -> IngestResult<IndexOutcome> {
        self.tracker.mark_processing(document_id).await?;

        match self.embed_document(document_id).await {
            Ok(()) => {
                self.tracker.mark_completed(document_id).await?;
                info!(document_id = %document_id, "Document indexed");
                Ok(IndexOutcome::Indexed(document_id))
            }
            Err(err) => {
                error!(document_id = %document_id, kind = err.kind(), error = %err, "Document indexing failed");
                if let Err(status_err) = self.tracker.mark_failed(document_id).await {
                    error!(
                        document_id = %document_id,
                        error = %status_err,
                        "Could not record failed status"
                    );
                }
                Err(err)
            }
        }
    }

    async fn embed_document(&self, document_id: Uuid) -> IngestResult<()> {
        let document = self.processor.load_document(document_id).await?;
        let processed = self.processor.process_document(&document).await?;
        let vector = self.embed_one(&processed.text).await?;

        let record = IndexRecord::new(
            document.id,
            Namespace::AvatarDocuments,
            vector,
            RecordMetadata::for_document(&document, processed.text),
        );
        upsert_batched(
            self.index.as_ref(),
            Namespace::AvatarDocuments,
            vec![record],
            &self.upsert_batching,
        )
        .await?;
        self.await_visibility(Namespace::AvatarDocuments, document.id, true).await;
        Ok(())
    }

    async fn remove(&self, namespace: Namespace, id: Uuid) -> IngestResult<IndexOutcome> {
        self.index.delete_by_id(namespace, id).await?;
        self.await_visibility(namespace, id, false).await;
        info!(namespace = %namespace, id = %id, "Record removed from index");
        Ok(IndexOutcome::Removed(id))
    }

    async fn embed_one(&self, text: &str) -> IngestResult<Vec<f32>> {
        let mut vectors = self.embedder.embed_batch(&[text.to_string()]).await?;
        vectors.pop().ok_or(IngestError::Embedding(EmbeddingError::CountMismatch {
            expected: 1,
            actual: 0,
        }))
    }

    /// Poll the index until `id` is (or is no longer) visible. A timeout is
    /// logged and otherwise ignored; the write itself already succeeded.
    async fn await_visibility(&self, namespace: Namespace, id: Uuid, present: bool) {
        if self.readiness.attempts == 0 {
            return;
        }

        let index = &self.index;
        let result = with_retry(
            move || async move {
                match index.contains(namespace, id).await {
                    Ok(visible) if visible == present => Ok(()),
                    Ok(_) => Err("write not yet visible".to_string()),
                    Err(e) => Err(e.to_string()),
                }
            },
            &self.readiness.retry_config(),
        )
        .await;

        if let Err(reason) = result {
            warn!(
                namespace = %namespace,
                id = %id,
                present,
                attempts = self.readiness.attempts,
                reason = %reason,
                "Index did not confirm write, acknowledging anyway"
            );
        }
    }
}
