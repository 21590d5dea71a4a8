//! Recall core library - shared domain types for indexing and retrieval.
//!
//! This crate provides:
//! - Content items (`Message`, `Document`) as emitted by the chat application
//! - The document embedding lifecycle (`EmbeddingStatus`)
//! - Vector index namespaces
//! - Change-event envelopes delivered by the source-of-truth store
//! - A small retry policy shared by readiness checks and retrieval retries

pub mod content;
pub mod event;
pub mod retry;

pub use content::{ContentItem, Document, EmbeddingStatus, Message, Namespace, StatusTransitionError};
pub use event::{ChangeEvent, EventError, EventType};
pub use retry::{with_retry, RetryConfig, RetryPolicy};

pub const CORE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude for common imports
pub mod prelude {
    pub use crate::content::{ContentItem, Document, EmbeddingStatus, Message, Namespace};
    pub use crate::event::{ChangeEvent, EventType};
}
