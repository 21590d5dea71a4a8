//! Embedding provider trait and implementations
//!
//! Providers turn text into fixed-dimension vectors. The [`Embedder`] wraps a
//! provider with sub-batching and throttling; callers outside this crate
//! should go through it rather than the provider directly.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::ProviderError;

pub mod embedder;
pub mod openai;

pub use embedder::{Embedder, EmbedderConfig, EmbeddingError, EmbeddingResult};
pub use openai::OpenAIEmbeddingProvider;

pub const DEFAULT_EMBEDDING_DIMENSION: usize = 1536;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRequest {
    pub text: String,
    pub model: Option<String>,
}

impl EmbeddingRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            model: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    pub embedding: Vec<f32>,
    pub model: String,
    pub dimension: usize,
    pub usage: Option<EmbeddingUsage>,
}

impl EmbeddingResponse {
    pub fn new(embedding: Vec<f32>, model: impl Into<String>) -> Self {
        let dimension = embedding.len();
        Self {
            embedding,
            model: model.into(),
            dimension,
            usage: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EmbeddingUsage {
    pub prompt_tokens: u32,
    pub total_tokens: u32,
}

impl EmbeddingUsage {
    pub fn new(prompt_tokens: u32, total_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            total_tokens,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchEmbeddingRequest {
    pub texts: Vec<String>,
    pub model: Option<String>,
}

impl BatchEmbeddingRequest {
    pub fn new(texts: Vec<String>) -> Self {
        Self { texts, model: None }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// Vectors in the same order as the request's texts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchEmbeddingResponse {
    pub embeddings: Vec<Vec<f32>>,
    pub model: String,
    pub dimension: usize,
    pub usage: Option<EmbeddingUsage>,
}

#[async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &'static str;

    fn dimension(&self) -> usize;

    async fn embed(&self, req: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError>;

    async fn embed_batch(&self, req: BatchEmbeddingRequest) -> Result<BatchEmbeddingResponse, ProviderError>;
}

const MOCK_MODEL: &str = "mock-embedding-model";

/// Deterministic embedding fake.
///
/// In constant mode every text maps to the same vector. In vocabulary mode
/// each vocabulary stem owns one dimension and a text's vector counts the
/// words starting with that stem, so texts sharing keywords score high and
/// unrelated texts score zero.
#[derive(Debug, Default)]
pub struct MockEmbeddingProvider {
    dimension: usize,
    vocabulary: Vec<String>,
    failures: Mutex<Vec<ProviderError>>,
    batch_sizes: Mutex<Vec<usize>>,
}

impl MockEmbeddingProvider {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            ..Default::default()
        }
    }

    pub fn with_vocabulary<I, S>(vocabulary: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let vocabulary: Vec<String> = vocabulary
            .into_iter()
            .map(|s| s.into().to_lowercase())
            .collect();
        Self {
            dimension: vocabulary.len(),
            vocabulary,
            ..Default::default()
        }
    }

    /// Make the next provider call fail with `err`.
    pub fn fail_next(&self, err: ProviderError) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(err);
    }

    /// Sizes of the batch calls received so far.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batch_sizes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn take_failure(&self) -> Option<ProviderError> {
        self.failures.lock().unwrap_or_else(PoisonError::into_inner).pop()
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        if self.vocabulary.is_empty() {
            return vec![0.1; self.dimension];
        }

        let lowered = text.to_lowercase();
        let words: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();

        self.vocabulary
            .iter()
            .map(|stem| words.iter().filter(|w| w.starts_with(stem.as_str())).count() as f32)
            .collect()
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    fn name(&self) -> &'static str {
        "mock-embedding"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, req: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError> {
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        Ok(EmbeddingResponse::new(self.vector_for(&req.text), MOCK_MODEL))
    }

    async fn embed_batch(&self, req: BatchEmbeddingRequest) -> Result<BatchEmbeddingResponse, ProviderError> {
        let count = req.texts.len();
        self.batch_sizes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(count);
        if let Some(err) = self.take_failure() {
            return Err(err);
        }

        let embeddings = req.texts.iter().map(|text| self.vector_for(text)).collect();
        Ok(BatchEmbeddingResponse {
            embeddings,
            model: MOCK_MODEL.to_string(),
            dimension: self.dimension,
            usage: Some(EmbeddingUsage::new(count as u32 * 10, count as u32 * 10)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedding_request_builder() {
        let req = EmbeddingRequest::new("hello world").with_model("text-embedding-3-small");
        assert_eq!(req.text, "hello world");
        assert_eq!(req.model, Some("text-embedding-3-small".to_string()));
    }

    #[tokio::test]
    async fn mock_provider_returns_constant_embedding() {
        let provider = MockEmbeddingProvider::new(128);
        let resp = provider.embed(EmbeddingRequest::new("test")).await.unwrap();
        assert_eq!(resp.dimension, 128);
        assert!(resp.embedding.iter().all(|v| (*v - 0.1).abs() < f32::EPSILON));
    }

    #[tokio::test]
    async fn vocabulary_mode_counts_stems() {
        let provider = MockEmbeddingProvider::with_vocabulary(["standup", "cook", "code"]);
        let resp = provider
            .embed(EmbeddingRequest::new("Cooking and cooks; standup."))
            .await
            .unwrap();

        assert_eq!(provider.dimension(), 3);
        assert_eq!(resp.embedding, vec![1.0, 2.0, 0.0]);
    }

    #[tokio::test]
    async fn mock_provider_fails_on_demand() {
        let provider = MockEmbeddingProvider::new(4);
        provider.fail_next(ProviderError::HttpStatus {
            status: 429,
            body: "slow down".to_string(),
        });

        let req = BatchEmbeddingRequest::new(vec!["a".to_string()]);
        assert!(provider.embed_batch(req.clone()).await.is_err());
        assert_eq!(provider.embed_batch(req).await.unwrap().embeddings.len(), 1);
        assert_eq!(provider.batch_sizes(), vec![1, 1]);
    }
}
