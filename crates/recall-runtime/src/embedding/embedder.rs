//! Throttled, all-or-nothing embedding front end.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, error};

use crate::embedding::{BatchEmbeddingRequest, EmbeddingProvider, EmbeddingRequest};
use crate::ProviderError;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding provider failed on batch {batch}: {source}")]
    Provider {
        batch: usize,
        #[source]
        source: ProviderError,
    },
    #[error("provider returned {actual} vectors for {expected} texts")]
    CountMismatch { expected: usize, actual: usize },
    #[error("provider returned a {actual}-dimension vector, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

pub type EmbeddingResult<T> = Result<T, EmbeddingError>;

#[derive(Debug, Clone)]
pub struct EmbedderConfig {
    /// Texts per provider call
    pub batch_size: usize,
    /// Pause between consecutive provider calls
    pub batch_delay: Duration,
    /// Model override; the provider default when unset
    pub model: Option<String>,
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            batch_size: 20,
            batch_delay: Duration::from_millis(1000),
            model: None,
        }
    }
}

impl EmbedderConfig {
    pub fn with_batching(mut self, batch_size: usize, batch_delay: Duration) -> Self {
        self.batch_size = batch_size.max(1);
        self.batch_delay = batch_delay;
        self
    }
}

/// Embeds text through a provider, splitting large inputs into sub-batches
/// and sleeping between them to stay under provider rate limits.
#[derive(Clone)]
pub struct Embedder {
    provider: Arc<dyn EmbeddingProvider>,
    config: EmbedderConfig,
}

impl Embedder {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, config: EmbedderConfig) -> Self {
        Self { provider, config }
    }

    pub fn dimension(&self) -> usize {
        self.provider.dimension()
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    pub async fn embed_query(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
        let mut req = EmbeddingRequest::new(text);
        if let Some(ref model) = self.config.model {
            req = req.with_model(model.clone());
        }

        let resp = self
            .provider
            .embed(req)
            .await
            .map_err(|source| EmbeddingError::Provider { batch: 1, source })?;

        self.check_dimension(&resp.embedding)?;
        Ok(resp.embedding)
    }

    /// Vectors come back in input order. Any failing sub-batch fails the
    /// whole call and no vectors are returned.
    pub async fn embed_batch(&self, texts: &[String]) -> EmbeddingResult<Vec<Vec<f32>>> {
        let batch_size = self.config.batch_size.max(1);
        let total_batches = texts.len().div_ceil(batch_size);
        let mut vectors = Vec::with_capacity(texts.len());

        for (i, chunk) in texts.chunks(batch_size).enumerate() {
            let batch = i + 1;
            if i > 0 && !self.config.batch_delay.is_zero() {
                tokio::time::sleep(self.config.batch_delay).await;
            }

            let mut req = BatchEmbeddingRequest::new(chunk.to_vec());
            if let Some(ref model) = self.config.model {
                req = req.with_model(model.clone());
            }

            let resp = self.provider.embed_batch(req).await.map_err(|source| {
                error!(
                    provider = self.provider.name(),
                    batch,
                    total_batches,
                    error = %source,
                    "Embedding batch failed"
                );
                EmbeddingError::Provider { batch, source }
            })?;

            if resp.embeddings.len() != chunk.len() {
                return Err(EmbeddingError::CountMismatch {
                    expected: chunk.len(),
                    actual: resp.embeddings.len(),
                });
            }
            for vector in &resp.embeddings {
                self.check_dimension(vector)?;
            }

            debug!(
                batch,
                total_batches,
                size = chunk.len(),
                tokens = ?resp.usage.map(|u| u.total_tokens),
                "Embedding batch completed"
            );
            vectors.extend(resp.embeddings);
        }

        Ok(vectors)
    }

    fn check_dimension(&self, vector: &[f32]) -> EmbeddingResult<()> {
        let expected = self.provider.dimension();
        if vector.len() != expected {
            return Err(EmbeddingError::DimensionMismatch {
                expected,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}
