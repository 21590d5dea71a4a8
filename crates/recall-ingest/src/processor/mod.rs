//! Document processor: blob bytes in, one normalized text out.

use std::sync::Arc;

use recall_core::Document;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::blob::BlobStore;
use crate::error::{IngestError, IngestResult};
use crate::store::DocumentStore;

pub mod extract;
pub mod format;
pub mod normalize;

pub use extract::{extract_text, ExtractFailure};
pub use format::DocumentFormat;
pub use normalize::{normalize_text, prepare_for_embedding, split_windows, ChunkConfig};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedMetadata {
    pub document_id: Uuid,
    pub name: String,
    pub mime_type: String,
    pub format: DocumentFormat,
    /// Characters after normalization, before windowing
    pub normalized_chars: usize,
    /// Windows joined into `text`; 1 for documents under the threshold
    pub window_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedDocument {
    pub text: String,
    pub metadata: ProcessedMetadata,
}

#[derive(Clone)]
pub struct DocumentProcessor {
    documents: Arc<dyn DocumentStore>,
    blobs: Arc<dyn BlobStore>,
    chunking: ChunkConfig,
}

impl DocumentProcessor {
    pub fn new(documents: Arc<dyn DocumentStore>, blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            documents,
            blobs,
            chunking: ChunkConfig::default(),
        }
    }

    pub fn with_chunking(mut self, chunking: ChunkConfig) -> Self {
        self.chunking = chunking;
        self
    }

    pub async fn load_document(&self, document_id: Uuid) -> IngestResult<Document> {
        self.documents
            .get_document(document_id)
            .await?
            .ok_or(IngestError::DocumentNotFound(document_id))
    }

    /// Load the document by id and extract its text.
    pub async fn process(&self, document_id: Uuid) -> IngestResult<ProcessedDocument> {
        let document = self.load_document(document_id).await?;
        self.process_document(&document).await
    }

    pub async fn process_document(&self, document: &Document) -> IngestResult<ProcessedDocument> {
        let format = DocumentFormat::from_mime(&document.mime_type).ok_or_else(|| {
            IngestError::UnsupportedFormat {
                mime_type: document.mime_type.clone(),
            }
        })?;

        let bytes = self.blobs.fetch(&document.storage_path).await?;
        debug!(
            document_id = %document.id,
            format = %format,
            bytes = bytes.len(),
            "Extracting document text"
        );

        // Extraction is CPU-bound and some parsers panic on malformed input.
        let raw = tokio::task::spawn_blocking(move || extract_text(format, &bytes))
            .await
            .map_err(|e| IngestError::extraction(document.id, format!("extractor aborted: {e}")))?
            .map_err(|e| IngestError::extraction(document.id, e))?;

        let normalized = normalize_text(&raw);
        if normalized.is_empty() {
            warn!(document_id = %document.id, format = %format, "Document has no extractable text");
            return Err(IngestError::extraction(document.id, "document contains no extractable text"));
        }

        let normalized_chars = normalized.chars().count();
        let (text, window_count) = prepare_for_embedding(&normalized, &self.chunking);
        if window_count > 1 {
            debug!(
                document_id = %document.id,
                normalized_chars,
                window_count,
                "Large document windowed into a single text"
            );
        }

        Ok(ProcessedDocument {
            text,
            metadata: ProcessedMetadata {
                document_id: document.id,
                name: document.name.clone(),
                mime_type: document.mime_type.clone(),
                format,
                normalized_chars,
                window_count,
            },
        })
    }
}
