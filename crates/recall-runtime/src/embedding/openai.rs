//! OpenAI Embedding Provider
//!
//! Implements the EmbeddingProvider trait for OpenAI's Embeddings API.
//! Transport failures, 429 and 5xx responses are retried with exponential
//! backoff; anything else fails immediately.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

use crate::embedding::{
    BatchEmbeddingRequest, BatchEmbeddingResponse, EmbeddingProvider, EmbeddingRequest, EmbeddingResponse,
    EmbeddingUsage, DEFAULT_EMBEDDING_DIMENSION,
};
use crate::ProviderError;

pub const DEFAULT_MODEL: &str = "text-embedding-3-small";

#[derive(Debug)]
pub struct OpenAIEmbeddingProvider {
    client: Client,
    api_key: String,
    base_url: String,
    default_model: String,
    dimension: usize,
    max_retries: u32,
    retry_base_delay: Duration,
}

impl OpenAIEmbeddingProvider {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        default_model: impl Into<String>,
        dimension: usize,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into(),
            default_model: default_model.into(),
            dimension,
            max_retries: 3,
            retry_base_delay: Duration::from_millis(200),
        })
    }

    /// Output dimension of the known OpenAI embedding models.
    pub fn dimension_for_model(model: &str) -> usize {
        match model {
            "text-embedding-3-large" => 3072,
            "text-embedding-3-small" | "text-embedding-ada-002" => 1536,
            _ => DEFAULT_EMBEDDING_DIMENSION,
        }
    }

    pub fn with_retry_policy(mut self, max_retries: u32, retry_base_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_base_delay = retry_base_delay;
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn get_model(&self, req_model: Option<&String>) -> String {
        req_model
            .cloned()
            .unwrap_or_else(|| self.default_model.clone())
    }

    async fn post_with_retry(&self, body: &EmbeddingRequestBody) -> Result<EmbeddingResponseBody, ProviderError> {
        let mut attempt = 0;
        loop {
            match self.post_embeddings(body).await {
                Ok(response) => return Ok(response),
                Err(err) if err.is_retriable() && attempt < self.max_retries => {
                    let delay = backoff(self.retry_base_delay, attempt);
                    warn!(
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Embedding request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) if err.is_retriable() => {
                    return Err(ProviderError::RetryExhausted {
                        attempts: attempt + 1,
                        last_error: err.to_string(),
                    });
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn post_embeddings(&self, body: &EmbeddingRequestBody) -> Result<EmbeddingResponseBody, ProviderError> {
        let response = self
            .client
            .post(self.endpoint("/embeddings"))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unable to read body>".to_string());
            return Err(ProviderError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequestBody {
    input: EmbeddingInput,
    model: String,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum EmbeddingInput {
    Single(String),
    Batch(Vec<String>),
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponseBody {
    data: Vec<EmbeddingData>,
    model: String,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: u32,
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    prompt_tokens: u32,
    total_tokens: u32,
}

impl From<OpenAIUsage> for EmbeddingUsage {
    fn from(usage: OpenAIUsage) -> Self {
        EmbeddingUsage::new(usage.prompt_tokens, usage.total_tokens)
    }
}

fn backoff(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(1_u32 << attempt.min(16))
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    fn name(&self) -> &'static str {
        "openai-embedding"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, req: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError> {
        let body = EmbeddingRequestBody {
            input: EmbeddingInput::Single(req.text),
            model: self.get_model(req.model.as_ref()),
        };

        let resp = self.post_with_retry(&body).await?;
        let data = resp
            .data
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Decode("No embedding data in response".to_string()))?;

        Ok(EmbeddingResponse {
            dimension: data.embedding.len(),
            embedding: data.embedding,
            model: resp.model,
            usage: resp.usage.map(Into::into),
        })
    }

    async fn embed_batch(&self, req: BatchEmbeddingRequest) -> Result<BatchEmbeddingResponse, ProviderError> {
        if req.texts.is_empty() {
            return Ok(BatchEmbeddingResponse {
                embeddings: Vec::new(),
                model: self.default_model.clone(),
                dimension: self.dimension,
                usage: None,
            });
        }

        let body = EmbeddingRequestBody {
            model: self.get_model(req.model.as_ref()),
            input: EmbeddingInput::Batch(req.texts),
        };

        let resp = self.post_with_retry(&body).await?;
        let mut data = resp.data;
        data.sort_by_key(|d| d.index);

        Ok(BatchEmbeddingResponse {
            embeddings: data.into_iter().map(|d| d.embedding).collect(),
            model: resp.model,
            dimension: self.dimension,
            usage: resp.usage.map(Into::into),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn provider(base_url: String, dimension: usize) -> OpenAIEmbeddingProvider {
        OpenAIEmbeddingProvider::new("test-key", base_url, DEFAULT_MODEL, dimension)
            .unwrap()
            .with_retry_policy(2, Duration::from_millis(1))
    }

    #[test]
    fn dimension_follows_model() {
        assert_eq!(OpenAIEmbeddingProvider::dimension_for_model("text-embedding-3-large"), 3072);
        assert_eq!(OpenAIEmbeddingProvider::dimension_for_model("text-embedding-3-small"), 1536);
        assert_eq!(
            OpenAIEmbeddingProvider::dimension_for_model("something-else"),
            DEFAULT_EMBEDDING_DIMENSION
        );
    }

    #[test]
    fn get_model_uses_request_model_when_specified() {
        let provider = provider("https://api.example.com/v1".to_string(), 1536);

        assert_eq!(provider.get_model(None), DEFAULT_MODEL);
        assert_eq!(
            provider.get_model(Some(&"text-embedding-ada-002".to_string())),
            "text-embedding-ada-002"
        );
    }

    #[test]
    fn request_body_serialization() {
        let single = EmbeddingRequestBody {
            input: EmbeddingInput::Single("hello world".to_string()),
            model: DEFAULT_MODEL.to_string(),
        };
        let batch = EmbeddingRequestBody {
            input: EmbeddingInput::Batch(vec!["hello".to_string(), "world".to_string()]),
            model: DEFAULT_MODEL.to_string(),
        };

        assert!(serde_json::to_string(&single).unwrap().contains("\"input\":\"hello world\""));
        assert!(serde_json::to_string(&batch).unwrap().contains("\"input\":[\"hello\",\"world\"]"));
    }

    #[tokio::test]
    async fn embed_batch_orders_results_by_index() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/embeddings")
                    .header("authorization", "Bearer test-key");
                then.status(200).json_body(serde_json::json!({
                    "object": "list",
                    "data": [
                        {"object": "embedding", "index": 1, "embedding": [0.2, 0.2]},
                        {"object": "embedding", "index": 0, "embedding": [0.1, 0.1]},
                        {"object": "embedding", "index": 2, "embedding": [0.3, 0.3]}
                    ],
                    "model": "text-embedding-3-small",
                    "usage": {"prompt_tokens": 15, "total_tokens": 15}
                }));
            })
            .await;

        let req = BatchEmbeddingRequest::new(vec!["a".to_string(), "b".to_string(), "c".to_string()]);
        let resp = provider(server.base_url(), 2).embed_batch(req).await.unwrap();

        mock.assert_async().await;
        assert_eq!(resp.embeddings, vec![vec![0.1, 0.1], vec![0.2, 0.2], vec![0.3, 0.3]]);
        assert_eq!(resp.usage.map(|u| u.total_tokens), Some(15));
    }

    #[tokio::test]
    async fn rate_limits_are_retried_until_exhausted() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/embeddings");
                then.status(429).body("rate limited");
            })
            .await;

        let err = provider(server.base_url(), 2)
            .embed(EmbeddingRequest::new("hello"))
            .await
            .unwrap_err();

        assert_eq!(mock.hits_async().await, 3);
        assert!(matches!(err, ProviderError::RetryExhausted { attempts: 3, .. }));
    }

    #[tokio::test]
    async fn client_errors_fail_immediately() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/embeddings");
                then.status(400).body("bad input");
            })
            .await;

        let err = provider(server.base_url(), 2)
            .embed(EmbeddingRequest::new("hello"))
            .await
            .unwrap_err();

        assert_eq!(mock.hits_async().await, 1);
        assert!(matches!(err, ProviderError::HttpStatus { status: 400, .. }));
    }
}
