//! Runtime abstractions for model providers.
//!
//! Two seams live here: [`AIProvider`] for generative completion and
//! [`embedding::EmbeddingProvider`] for vectors. Both ship an in-process fake
//! so higher layers can be tested without network access.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod embedding;
pub mod providers;

pub use embedding::{
    Embedder, EmbedderConfig, EmbeddingError, EmbeddingProvider, EmbeddingResult, MockEmbeddingProvider,
    OpenAIEmbeddingProvider,
};
pub use providers::OpenAIProvider;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub prompt: String,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub metadata: Option<serde_json::Value>,
}

impl GenerateRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: None,
            max_tokens: None,
            temperature: None,
            metadata: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub content: String,
    pub model: Option<String>,
    pub finish_reason: Option<String>,
}

impl GenerateResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            model: None,
            finish_reason: Some("stop".to_string()),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("provider returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("failed to decode provider response: {0}")]
    Decode(String),
    #[error("gave up after {attempts} attempts: {last_error}")]
    RetryExhausted { attempts: u32, last_error: String },
    #[error("mock provider has no queued response")]
    MockQueueEmpty,
    #[error("provider error: {0}")]
    Message(String),
}

impl ProviderError {
    /// Rate limiting, server errors and broken connections are worth another try.
    pub fn is_retriable(&self) -> bool {
        match self {
            ProviderError::Transport(_) => true,
            ProviderError::HttpStatus { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

/// Generative model: prompt in, completion out.
#[async_trait]
pub trait AIProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn generate(&self, req: GenerateRequest) -> Result<GenerateResponse, ProviderError>;
}

/// Queue-driven generative fake that remembers every request it saw.
#[derive(Debug, Default)]
pub struct MockProvider {
    generate_queue: Mutex<VecDeque<Result<GenerateResponse, ProviderError>>>,
    fallback: Mutex<Option<String>>,
    requests: Mutex<Vec<GenerateRequest>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer with `content` whenever the queue is empty.
    pub fn with_fallback_response(self, content: impl Into<String>) -> Self {
        *self.fallback.lock().unwrap_or_else(PoisonError::into_inner) = Some(content.into());
        self
    }

    pub fn enqueue_generate(&self, result: Result<GenerateResponse, ProviderError>) {
        self.generate_queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(result);
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .map(|req| req.prompt.clone())
    }
}

#[async_trait]
impl AIProvider for MockProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn generate(&self, req: GenerateRequest) -> Result<GenerateResponse, ProviderError> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).push(req);

        let queued = self
            .generate_queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        if let Some(result) = queued {
            return result;
        }

        match self.fallback.lock().unwrap_or_else(PoisonError::into_inner).as_ref() {
            Some(content) => Ok(GenerateResponse::text(content.clone())),
            None => Err(ProviderError::MockQueueEmpty),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AIProvider, GenerateRequest, GenerateResponse, MockProvider, ProviderError};

    fn request() -> GenerateRequest {
        GenerateRequest::new("hello")
            .with_model("mock-1")
            .with_max_tokens(64)
            .with_temperature(0.0)
    }

    #[tokio::test]
    async fn mock_generate_returns_queued_response() {
        let provider = MockProvider::new();
        provider.enqueue_generate(Ok(GenerateResponse {
            content: "hello from mock".to_string(),
            model: Some("mock-1".to_string()),
            finish_reason: Some("stop".to_string()),
        }));

        let response = provider.generate(request()).await.unwrap();

        assert_eq!(response.content, "hello from mock");
        assert_eq!(response.model.as_deref(), Some("mock-1"));
        assert_eq!(response.finish_reason.as_deref(), Some("stop"));
    }

    #[tokio::test]
    async fn mock_reports_empty_queue_error() {
        let provider = MockProvider::new();

        let err = provider.generate(request()).await.unwrap_err();

        assert_eq!(err, ProviderError::MockQueueEmpty);
    }

    #[tokio::test]
    async fn mock_records_prompts_and_uses_fallback() {
        let provider = MockProvider::new().with_fallback_response("fallback");
        provider.enqueue_generate(Err(ProviderError::Message("upstream timeout".to_string())));

        let first = provider.generate(GenerateRequest::new("one")).await;
        let second = provider.generate(GenerateRequest::new("two")).await.unwrap();

        assert_eq!(first.unwrap_err(), ProviderError::Message("upstream timeout".to_string()));
        assert_eq!(second.content, "fallback");
        assert_eq!(provider.requests().len(), 2);
        assert_eq!(provider.last_prompt().as_deref(), Some("two"));
    }

    #[test]
    fn retriable_errors() {
        assert!(ProviderError::Transport("reset".into()).is_retriable());
        assert!(ProviderError::HttpStatus { status: 429, body: String::new() }.is_retriable());
        assert!(ProviderError::HttpStatus { status: 503, body: String::new() }.is_retriable());
        assert!(!ProviderError::HttpStatus { status: 400, body: String::new() }.is_retriable());
        assert!(!ProviderError::Decode("bad json".into()).is_retriable());
    }
}
