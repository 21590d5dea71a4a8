//! Content items eligible for indexing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Logical partition of the vector index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Namespace {
    /// Chat messages, scoped by channel.
    Messages,
    /// Per-user knowledge documents, scoped by owner.
    AvatarDocuments,
}

impl Namespace {
    pub const ALL: [Namespace; 2] = [Namespace::Messages, Namespace::AvatarDocuments];

    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Messages => "messages",
            Namespace::AvatarDocuments => "avatar_documents",
        }
    }

    /// Whether every query against this namespace must be scoped to an owner.
    pub fn requires_owner_filter(&self) -> bool {
        matches!(self, Namespace::AvatarDocuments)
    }
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A chat message as stored by the chat application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub channel_id: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    pub content: String,
    #[serde(default)]
    pub is_edited: bool,
    #[serde(default)]
    pub has_attachment: bool,
}

impl Message {
    pub fn new(channel_id: Uuid, user_id: Uuid, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            channel_id,
            user_id,
            created_at: Utc::now(),
            updated_at: None,
            content: content.into(),
            is_edited: false,
            has_attachment: false,
        }
    }

    /// Apply an edit the way the chat application does.
    pub fn edited(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self.is_edited = true;
        self.updated_at = Some(Utc::now());
        self
    }
}

/// Embedding lifecycle of a knowledge document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid embedding status transition: {from} -> {to}")]
pub struct StatusTransitionError {
    pub from: EmbeddingStatus,
    pub to: EmbeddingStatus,
}

impl EmbeddingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmbeddingStatus::Pending => "pending",
            EmbeddingStatus::Processing => "processing",
            EmbeddingStatus::Completed => "completed",
            EmbeddingStatus::Failed => "failed",
        }
    }

    /// Lifecycle is pending -> processing -> {completed, failed}. Any state may
    /// re-enter processing on a re-trigger, which also covers redelivery of a
    /// job that crashed mid-flight.
    pub fn can_transition_to(&self, next: EmbeddingStatus) -> bool {
        use EmbeddingStatus::{Completed, Failed, Processing};
        matches!(
            (*self, next),
            (_, Processing) | (Processing, Completed | Failed)
        )
    }

    pub fn transition(self, next: EmbeddingStatus) -> Result<EmbeddingStatus, StatusTransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(StatusTransitionError { from: self, to: next })
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, EmbeddingStatus::Completed | EmbeddingStatus::Failed)
    }
}

impl std::fmt::Display for EmbeddingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for EmbeddingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(EmbeddingStatus::Pending),
            "processing" => Ok(EmbeddingStatus::Processing),
            "completed" => Ok(EmbeddingStatus::Completed),
            "failed" => Ok(EmbeddingStatus::Failed),
            other => Err(format!("unknown embedding status: {other}")),
        }
    }
}

/// A knowledge document uploaded by a user for their persona.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub mime_type: String,
    pub size: u64,
    pub storage_path: String,
    #[serde(default)]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub created_by: Uuid,
    #[serde(default)]
    pub embedding_status: EmbeddingStatus,
}

impl Document {
    pub fn new(
        user_id: Uuid,
        name: impl Into<String>,
        mime_type: impl Into<String>,
        storage_path: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            name: name.into(),
            mime_type: mime_type.into(),
            size: 0,
            storage_path: storage_path.into(),
            description: None,
            created_at: Utc::now(),
            created_by: user_id,
            embedding_status: EmbeddingStatus::Pending,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    /// Whether `other` differs in a field that changes what gets indexed.
    /// Status-only updates are written by the pipeline itself and must not
    /// trigger another embedding run.
    pub fn content_changed(&self, other: &Document) -> bool {
        self.storage_path != other.storage_path
            || self.mime_type != other.mime_type
            || self.name != other.name
            || self.description != other.description
    }
}

/// Anything the indexing pipeline can index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentItem {
    Message(Message),
    Document(Document),
}

impl ContentItem {
    pub fn id(&self) -> Uuid {
        match self {
            ContentItem::Message(m) => m.id,
            ContentItem::Document(d) => d.id,
        }
    }

    pub fn namespace(&self) -> Namespace {
        match self {
            ContentItem::Message(_) => Namespace::Messages,
            ContentItem::Document(_) => Namespace::AvatarDocuments,
        }
    }

    /// Messages carry no status; their index update is synchronous with the event.
    pub fn embedding_status(&self) -> Option<EmbeddingStatus> {
        match self {
            ContentItem::Message(_) => None,
            ContentItem::Document(d) => Some(d.embedding_status),
        }
    }
}

impl From<Message> for ContentItem {
    fn from(message: Message) -> Self {
        ContentItem::Message(message)
    }
}

impl From<Document> for ContentItem {
    fn from(document: Document) -> Self {
        ContentItem::Document(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_names_match_index_partitions() {
        assert_eq!(Namespace::Messages.as_str(), "messages");
        assert_eq!(Namespace::AvatarDocuments.to_string(), "avatar_documents");
        assert!(Namespace::AvatarDocuments.requires_owner_filter());
        assert!(!Namespace::Messages.requires_owner_filter());
    }

    #[test]
    fn status_follows_lifecycle() {
        use EmbeddingStatus::*;

        assert!(Pending.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Failed));
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Pending.can_transition_to(Failed));
        assert!(!Completed.can_transition_to(Pending));
        assert!(!Failed.can_transition_to(Completed));
    }

    #[test]
    fn retrigger_reenters_processing() {
        use EmbeddingStatus::*;

        assert_eq!(Failed.transition(Processing), Ok(Processing));
        assert_eq!(Completed.transition(Processing), Ok(Processing));
        assert_eq!(Processing.transition(Processing), Ok(Processing));
        assert_eq!(
            Completed.transition(Failed),
            Err(StatusTransitionError { from: Completed, to: Failed })
        );
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            EmbeddingStatus::Pending,
            EmbeddingStatus::Processing,
            EmbeddingStatus::Completed,
            EmbeddingStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<EmbeddingStatus>(), Ok(status));
        }
        assert!("done".parse::<EmbeddingStatus>().is_err());
    }

    #[test]
    fn document_deserializes_from_camel_case_row() {
        let json = serde_json::json!({
            "id": "6f1c1a51-4a0e-4bd4-9d77-3b0a8f7c2a10",
            "userId": "0b7f6f0e-7c71-4f5e-8b80-2d2f3f3b8e01",
            "name": "recipes.md",
            "mimeType": "text/markdown",
            "size": 120,
            "storagePath": "avatars/recipes.md",
            "createdAt": "2024-05-01T10:00:00Z",
            "createdBy": "0b7f6f0e-7c71-4f5e-8b80-2d2f3f3b8e01",
            "embeddingStatus": "processing"
        });

        let doc: Document = serde_json::from_value(json).unwrap();
        assert_eq!(doc.embedding_status, EmbeddingStatus::Processing);
        assert!(doc.description.is_none());
    }

    #[test]
    fn status_only_update_is_not_a_content_change() {
        let doc = Document::new(Uuid::new_v4(), "a.txt", "text/plain", "p/a.txt");
        let mut updated = doc.clone();
        updated.embedding_status = EmbeddingStatus::Completed;
        assert!(!doc.content_changed(&updated));

        updated.storage_path = "p/b.txt".to_string();
        assert!(doc.content_changed(&updated));
    }

    #[test]
    fn edit_marks_message_edited() {
        let msg = Message::new(Uuid::new_v4(), Uuid::new_v4(), "foo").edited("bar");
        assert!(msg.is_edited);
        assert!(msg.updated_at.is_some());
        assert_eq!(ContentItem::from(msg).namespace(), Namespace::Messages);
    }
}
