//! Core types for the vector index

use chrono::{DateTime, Utc};
use recall_core::{Document, Message, Namespace};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Cosine similarity between two vectors. Mismatched or zero-length vectors
/// score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        0.0
    } else {
        dot / (mag_a * mag_b)
    }
}

/// Payload stored next to each vector.
///
/// `owner_id` is the author of a message or the owner of a document;
/// `scope_id` is the channel a message was posted in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub content: String,
    pub owner_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_edited: bool,
    #[serde(default)]
    pub has_attachment: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl RecordMetadata {
    pub fn new(owner_id: Uuid, content: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            content: content.into(),
            owner_id,
            scope_id: None,
            created_at,
            updated_at: None,
            is_edited: false,
            has_attachment: false,
            document_name: None,
            mime_type: None,
            description: None,
        }
    }

    pub fn with_scope(mut self, scope_id: Uuid) -> Self {
        self.scope_id = Some(scope_id);
        self
    }

    /// Metadata for a chat message. Reflects edit state and timestamps.
    pub fn for_message(message: &Message) -> Self {
        Self {
            updated_at: message.updated_at,
            is_edited: message.is_edited,
            has_attachment: message.has_attachment,
            ..Self::new(message.user_id, message.content.clone(), message.created_at)
                .with_scope(message.channel_id)
        }
    }

    /// Metadata for a knowledge document whose extracted text is `content`.
    pub fn for_document(document: &Document, content: impl Into<String>) -> Self {
        Self {
            document_name: Some(document.name.clone()),
            mime_type: Some(document.mime_type.clone()),
            description: document.description.clone(),
            ..Self::new(document.user_id, content, document.created_at)
        }
    }
}

/// One vector entry, keyed by the id of the content item it was built from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub id: Uuid,
    pub namespace: Namespace,
    pub vector: Vec<f32>,
    pub metadata: RecordMetadata,
}

impl IndexRecord {
    pub fn new(id: Uuid, namespace: Namespace, vector: Vec<f32>, metadata: RecordMetadata) -> Self {
        Self {
            id,
            namespace,
            vector,
            metadata,
        }
    }
}

/// Equality filters on record metadata. All set fields must match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFilter {
    pub owner_id: Option<Uuid>,
    pub scope_id: Option<Uuid>,
}

impl RecordFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn owner(owner_id: Uuid) -> Self {
        Self {
            owner_id: Some(owner_id),
            scope_id: None,
        }
    }

    pub fn scope(scope_id: Uuid) -> Self {
        Self {
            owner_id: None,
            scope_id: Some(scope_id),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.owner_id.is_none() && self.scope_id.is_none()
    }

    pub fn matches(&self, metadata: &RecordMetadata) -> bool {
        if let Some(owner_id) = self.owner_id {
            if metadata.owner_id != owner_id {
                return false;
            }
        }

        if let Some(scope_id) = self.scope_id {
            if metadata.scope_id != Some(scope_id) {
                return false;
            }
        }

        true
    }
}

/// Similarity query against one namespace.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexQuery {
    pub vector: Vec<f32>,
    pub filter: RecordFilter,
    pub top_k: usize,
}

impl IndexQuery {
    pub fn new(vector: Vec<f32>, top_k: usize) -> Self {
        Self {
            vector,
            filter: RecordFilter::default(),
            top_k,
        }
    }

    pub fn with_filter(mut self, filter: RecordFilter) -> Self {
        self.filter = filter;
        self
    }
}

/// Scored hit returned by a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMatch {
    pub id: Uuid,
    pub score: f32,
    pub metadata: RecordMetadata,
}
