//! PostgreSQL-backed document store.

use async_trait::async_trait;
use recall_core::{Document, EmbeddingStatus};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::DocumentStore;
use crate::error::{IngestError, IngestResult};

/// SQL schema for the `avatar_documents` table.
pub const AVATAR_DOCUMENTS_TABLE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS avatar_documents (
    id UUID PRIMARY KEY,
    user_id UUID NOT NULL,
    name TEXT NOT NULL,
    mime_type TEXT NOT NULL,
    size BIGINT NOT NULL DEFAULT 0,
    storage_path TEXT NOT NULL,
    description TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    created_by UUID NOT NULL,
    embedding_status TEXT NOT NULL DEFAULT 'pending'
);"#;

const SELECT_DOCUMENT: &str = "SELECT id, user_id, name, mime_type, size, storage_path, description, \
     created_at, created_by, embedding_status FROM avatar_documents WHERE id = $1";

const REGISTER_DOCUMENT: &str = "INSERT INTO avatar_documents \
     (id, user_id, name, mime_type, size, storage_path, description, created_at, created_by, embedding_status) \
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
     ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, mime_type = EXCLUDED.mime_type, \
     size = EXCLUDED.size, storage_path = EXCLUDED.storage_path, description = EXCLUDED.description";

fn store_err(e: sqlx::Error) -> IngestError {
    IngestError::Store(e.to_string())
}

#[derive(Debug, Clone)]
pub struct PostgresDocumentStore {
    pool: PgPool,
}

impl PostgresDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> IngestResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(store_err)?;
        Ok(Self::new(pool))
    }

    /// Create the table if it does not exist.
    pub async fn initialize_schema(&self) -> IngestResult<()> {
        sqlx::query(AVATAR_DOCUMENTS_TABLE_SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(())
    }

    fn row_to_document(row: &PgRow) -> IngestResult<Document> {
        let status: String = row.try_get("embedding_status").map_err(store_err)?;
        let size: i64 = row.try_get("size").map_err(store_err)?;

        Ok(Document {
            id: row.try_get("id").map_err(store_err)?,
            user_id: row.try_get("user_id").map_err(store_err)?,
            name: row.try_get("name").map_err(store_err)?,
            mime_type: row.try_get("mime_type").map_err(store_err)?,
            size: u64::try_from(size).unwrap_or_default(),
            storage_path: row.try_get("storage_path").map_err(store_err)?,
            description: row.try_get("description").map_err(store_err)?,
            created_at: row.try_get("created_at").map_err(store_err)?,
            created_by: row.try_get("created_by").map_err(store_err)?,
            embedding_status: status.parse().map_err(IngestError::Store)?,
        })
    }
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    async fn get_document(&self, id: Uuid) -> IngestResult<Option<Document>> {
        let row = sqlx::query(SELECT_DOCUMENT)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;

        row.as_ref().map(Self::row_to_document).transpose()
    }

    async fn register_document(&self, document: &Document) -> IngestResult<()> {
        sqlx::query(REGISTER_DOCUMENT)
            .bind(document.id)
            .bind(document.user_id)
            .bind(&document.name)
            .bind(&document.mime_type)
            .bind(i64::try_from(document.size).unwrap_or(i64::MAX))
            .bind(&document.storage_path)
            .bind(&document.description)
            .bind(document.created_at)
            .bind(document.created_by)
            .bind(document.embedding_status.as_str())
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn set_embedding_status(&self, id: Uuid, status: EmbeddingStatus) -> IngestResult<()> {
        let result = sqlx::query("UPDATE avatar_documents SET embedding_status = $1 WHERE id = $2")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;

        if result.rows_affected() == 0 {
            return Err(IngestError::DocumentNotFound(id));
        }
        Ok(())
    }
}
