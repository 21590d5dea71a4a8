//! PostgreSQL-backed persona directory.

use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::{Persona, PersonaDirectory};
use crate::error::{RagError, RagResult};

/// SQL schema for the `personas` table.
pub const PERSONAS_TABLE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS personas (
    id UUID PRIMARY KEY,
    display_name TEXT NOT NULL,
    bio TEXT,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);"#;

fn directory_err(e: sqlx::Error) -> RagError {
    RagError::Directory(e.to_string())
}

#[derive(Debug, Clone)]
pub struct PostgresPersonaDirectory {
    pool: PgPool,
}

impl PostgresPersonaDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> RagResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(directory_err)?;
        Ok(Self::new(pool))
    }

    /// Create the table if it does not exist.
    pub async fn initialize_schema(&self) -> RagResult<()> {
        sqlx::query(PERSONAS_TABLE_SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(directory_err)?;
        Ok(())
    }

    fn row_to_persona(row: &PgRow) -> RagResult<Persona> {
        Ok(Persona {
            id: row.try_get("id").map_err(directory_err)?,
            display_name: row.try_get("display_name").map_err(directory_err)?,
            bio: row.try_get("bio").map_err(directory_err)?,
        })
    }
}

#[async_trait]
impl PersonaDirectory for PostgresPersonaDirectory {
    async fn get_persona(&self, id: Uuid) -> RagResult<Option<Persona>> {
        let row = sqlx::query("SELECT id, display_name, bio FROM personas WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(directory_err)?;

        row.as_ref().map(Self::row_to_persona).transpose()
    }

    async fn put_persona(&self, persona: Persona) -> RagResult<()> {
        sqlx::query(
            "INSERT INTO personas (id, display_name, bio) VALUES ($1, $2, $3) \
             ON CONFLICT (id) DO UPDATE SET display_name = EXCLUDED.display_name, \
             bio = EXCLUDED.bio, updated_at = NOW()",
        )
        .bind(persona.id)
        .bind(&persona.display_name)
        .bind(&persona.bio)
        .execute(&self.pool)
        .await
        .map_err(directory_err)?;
        Ok(())
    }
}
