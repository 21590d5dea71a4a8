//! Persona profiles used to set the voice of persona answers.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::RagResult;

#[cfg(feature = "persistence-sqlx")]
pub mod postgres;

#[cfg(feature = "persistence-sqlx")]
pub use postgres::PostgresPersonaDirectory;

/// Display name used when an owner never registered a profile.
pub const UNNAMED_PERSONA: &str = "the owner of these documents";

/// A user's simulated first-person assistant. `id` is the owning user's id,
/// which is also the owner of the documents the persona may draw on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Persona {
    pub id: Uuid,
    pub display_name: String,
    #[serde(default)]
    pub bio: Option<String>,
}

impl Persona {
    pub fn new(id: Uuid, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            bio: None,
        }
    }

    /// Profile for an owner whose documents exist but who has no stored profile.
    pub fn unnamed(id: Uuid) -> Self {
        Self::new(id, UNNAMED_PERSONA)
    }

    pub fn with_bio(mut self, bio: impl Into<String>) -> Self {
        self.bio = Some(bio.into());
        self
    }
}

#[async_trait]
pub trait PersonaDirectory: Send + Sync {
    async fn get_persona(&self, id: Uuid) -> RagResult<Option<Persona>>;

    /// Create or replace the profile for `persona.id`.
    async fn put_persona(&self, persona: Persona) -> RagResult<()>;
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryPersonaDirectory {
    personas: Arc<RwLock<HashMap<Uuid, Persona>>>,
}

impl InMemoryPersonaDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, persona: Persona) {
        self.personas.write().await.insert(persona.id, persona);
    }
}

#[async_trait]
impl PersonaDirectory for InMemoryPersonaDirectory {
    async fn get_persona(&self, id: Uuid) -> RagResult<Option<Persona>> {
        Ok(self.personas.read().await.get(&id).cloned())
    }

    async fn put_persona(&self, persona: Persona) -> RagResult<()> {
        self.insert(persona).await;
        Ok(())
    }
}
