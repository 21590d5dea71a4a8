//! Shared application state and its construction from configuration.

use std::sync::Arc;

use anyhow::Context;
use recall_ingest::{
    BlobStore, DocumentProcessor, DocumentStore, HttpBlobStore, InMemoryDocumentStore, IndexingPipeline,
    LocalBlobStore, StatusTracker,
};
use recall_rag::{InMemoryPersonaDirectory, PersonaDirectory, RagService, Retriever, SynthesizerConfig};
use recall_runtime::{AIProvider, Embedder, OpenAIEmbeddingProvider, OpenAIProvider};
use recall_vector::{InMemoryVectorIndex, VectorIndex};
use tracing::{info, warn};

use crate::config::{BlobSettings, GatewayConfig};

#[derive(Clone)]
pub struct AppState {
    pub pipeline: IndexingPipeline,
    pub rag: RagService,
    pub personas: Arc<dyn PersonaDirectory>,
    webhook_secret: Arc<str>,
}

impl AppState {
    pub fn new(
        pipeline: IndexingPipeline,
        rag: RagService,
        personas: Arc<dyn PersonaDirectory>,
        webhook_secret: impl Into<String>,
    ) -> Self {
        Self {
            pipeline,
            rag,
            personas,
            webhook_secret: Arc::from(webhook_secret.into()),
        }
    }

    pub fn webhook_secret(&self) -> &str {
        &self.webhook_secret
    }

    /// Wire providers, stores and services from configuration.
    pub async fn from_config(config: &GatewayConfig) -> anyhow::Result<Self> {
        let openai = &config.openai;
        let dimension = OpenAIEmbeddingProvider::dimension_for_model(&openai.embedding_model);

        let embeddings = OpenAIEmbeddingProvider::new(
            openai.api_key.clone(),
            openai.api_base.clone(),
            openai.embedding_model.clone(),
            dimension,
        )
        .context("failed to build embedding client")?;
        let embedder = Embedder::new(Arc::new(embeddings), config.embedder.clone());

        let generator: Arc<dyn AIProvider> = Arc::new(
            OpenAIProvider::new(openai.api_key.clone(), openai.api_base.clone(), openai.default_model.clone())
                .context("failed to build chat completion client")?,
        );

        let index = vector_index(config, dimension).await?;
        let documents = document_store(config).await?;
        let blobs = blob_store(&config.blobs)?;

        let processor = DocumentProcessor::new(documents.clone(), blobs);
        let pipeline = IndexingPipeline::new(processor, embedder.clone(), index.clone(), StatusTracker::new(documents))
            .with_upsert_batching(config.upsert.clone())
            .with_readiness(config.readiness.clone());

        let personas = persona_directory(config).await?;
        let rag = RagService::new(
            Retriever::new(embedder, index),
            generator,
            personas.clone(),
            SynthesizerConfig {
                model: Some(openai.default_model.clone()),
                ..SynthesizerConfig::default()
            },
        );

        Ok(Self::new(pipeline, rag, personas, config.webhook_secret.clone()))
    }
}

async fn vector_index(config: &GatewayConfig, dimension: usize) -> anyhow::Result<Arc<dyn VectorIndex>> {
    match &config.qdrant {
        #[cfg(feature = "qdrant")]
        Some(settings) => {
            let mut qdrant = recall_vector::QdrantConfig::new(&settings.url, &settings.collection_prefix, dimension);
            if let Some(ref api_key) = settings.api_key {
                qdrant = qdrant.with_api_key(api_key);
            }
            let index = recall_vector::QdrantVectorIndex::new(qdrant)
                .await
                .context("failed to connect to Qdrant")?;
            info!(url = %settings.url, dimension, "Using Qdrant vector index");
            Ok(Arc::new(index))
        }
        #[cfg(not(feature = "qdrant"))]
        Some(settings) => {
            warn!(url = %settings.url, "RECALL_QDRANT_URL set but the qdrant feature is disabled; using in-memory index");
            Ok(Arc::new(InMemoryVectorIndex::new(dimension)))
        }
        None => {
            info!(dimension, "Using in-memory vector index");
            Ok(Arc::new(InMemoryVectorIndex::new(dimension)))
        }
    }
}

async fn document_store(config: &GatewayConfig) -> anyhow::Result<Arc<dyn DocumentStore>> {
    match &config.database_url {
        #[cfg(feature = "persistence-sqlx")]
        Some(url) => {
            let store = recall_ingest::PostgresDocumentStore::connect(url)
                .await
                .context("failed to connect to document database")?;
            info!("Using Postgres document store");
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "persistence-sqlx"))]
        Some(_) => {
            warn!("DATABASE_URL set but the persistence-sqlx feature is disabled; using in-memory document store");
            Ok(Arc::new(InMemoryDocumentStore::new()))
        }
        None => {
            warn!("No DATABASE_URL; document statuses are kept in memory only");
            Ok(Arc::new(InMemoryDocumentStore::new()))
        }
    }
}

async fn persona_directory(config: &GatewayConfig) -> anyhow::Result<Arc<dyn PersonaDirectory>> {
    match &config.database_url {
        #[cfg(feature = "persistence-sqlx")]
        Some(url) => {
            let directory = recall_rag::PostgresPersonaDirectory::connect(url)
                .await
                .context("failed to connect to persona database")?;
            directory
                .initialize_schema()
                .await
                .context("failed to create personas table")?;
            info!("Using Postgres persona directory");
            Ok(Arc::new(directory))
        }
        #[cfg(not(feature = "persistence-sqlx"))]
        Some(_) => {
            warn!("DATABASE_URL set but the persistence-sqlx feature is disabled; using in-memory persona directory");
            Ok(Arc::new(InMemoryPersonaDirectory::new()))
        }
        None => {
            warn!("No DATABASE_URL; persona profiles are kept in memory only");
            Ok(Arc::new(InMemoryPersonaDirectory::new()))
        }
    }
}

fn blob_store(settings: &BlobSettings) -> anyhow::Result<Arc<dyn BlobStore>> {
    match settings {
        BlobSettings::Local { root } => {
            info!(root = %root.display(), "Using local blob store");
            Ok(Arc::new(LocalBlobStore::new(root.clone())))
        }
        BlobSettings::Http { base_url, token } => {
            let mut store = HttpBlobStore::new(base_url.clone()).context("failed to build blob client")?;
            if let Some(token) = token {
                store = store.with_token(token.clone());
            }
            info!(base_url = %base_url, "Using HTTP blob store");
            Ok(Arc::new(store))
        }
    }
}
