//! Recall RAG - retrieval and answer synthesis.
//!
//! This crate provides:
//! - The `Retriever` with its open and persona search policies
//! - Open Q&A and persona Q&A synthesizers
//! - The persona directory seam and its in-memory and Postgres implementations
//! - `RagService`, the consumer-facing entry point

pub mod error;
pub mod persona;
pub mod retriever;
pub mod service;
pub mod synthesizer;

pub use error::{RagError, RagResult};
pub use persona::{InMemoryPersonaDirectory, Persona, PersonaDirectory, UNNAMED_PERSONA};

#[cfg(feature = "persistence-sqlx")]
pub use persona::PostgresPersonaDirectory;
pub use retriever::{RetrievalResult, Retriever, RetrieverConfig, SearchScope};
pub use service::RagService;
pub use synthesizer::{
    ContextDocument, OpenQaSynthesizer, PersonaAnswer, PersonaSynthesizer, Source, SynthesizedAnswer,
    SynthesizerConfig, FALLBACK_ANSWER,
};

/// Prelude for common imports
pub mod prelude {
    pub use crate::error::{RagError, RagResult};
    pub use crate::retriever::{RetrievalResult, Retriever, SearchScope};
    pub use crate::service::RagService;
    pub use crate::synthesizer::{PersonaAnswer, SynthesizedAnswer};
}
