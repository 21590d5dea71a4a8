//! OpenAI API Provider
//!
//! Implements the AIProvider trait for OpenAI's Chat Completions API. Each
//! call sends the prompt as a single user message. Failed calls are returned
//! as-is; generation is never retried.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::{AIProvider, GenerateRequest, GenerateResponse, ProviderError};

pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Debug)]
pub struct OpenAIProvider {
    client: Client,
    api_key: String,
    base_url: String,
    pub default_model: String,
}

impl OpenAIProvider {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        default_model: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into(),
            default_model: default_model.into(),
        })
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    pub fn get_model(&self, req: &GenerateRequest) -> String {
        req.model.clone().unwrap_or_else(|| self.default_model.clone())
    }
}

#[derive(Debug, Serialize)]
struct ChatRequestBody<'a> {
    model: String,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponseBody {
    model: Option<String>,
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[async_trait]
impl AIProvider for OpenAIProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn generate(&self, req: GenerateRequest) -> Result<GenerateResponse, ProviderError> {
        let model = self.get_model(&req);
        let body = ChatRequestBody {
            model: model.clone(),
            messages: vec![ChatMessage {
                role: "user",
                content: &req.prompt,
            }],
            max_tokens: req.max_tokens,
            temperature: req.temperature,
        };

        let response = self
            .client
            .post(self.endpoint("/chat/completions"))
            .bearer_auth(&self.api_key)
            .json(&body)
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

        let resp: ChatResponseBody = response
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))?;

        let choice = resp
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Decode("No choices in response".to_string()))?;

        let content = choice
            .message
            .content
            .ok_or_else(|| ProviderError::Decode("Choice has no content".to_string()))?;

        debug!(model = %model, chars = content.len(), "Completion received");

        Ok(GenerateResponse {
            content,
            model: resp.model.or(Some(model)),
            finish_reason: choice.finish_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[test]
    fn endpoint_building() {
        let provider = OpenAIProvider::new("key", "https://api.openai.com/v1", "gpt-4").unwrap();
        assert_eq!(provider.endpoint("/chat/completions"), "https://api.openai.com/v1/chat/completions");

        let provider2 = OpenAIProvider::new("key", "https://api.openai.com/v1/", "gpt-4").unwrap();
        assert_eq!(provider2.endpoint("/chat/completions"), "https://api.openai.com/v1/chat/completions");
    }

    #[test]
    fn get_model_prefers_request_model() {
        let provider = OpenAIProvider::new("key", "https://api.example.com/v1", "gpt-4-turbo").unwrap();

        assert_eq!(provider.get_model(&GenerateRequest::new("test")), "gpt-4-turbo");
        assert_eq!(
            provider.get_model(&GenerateRequest::new("test").with_model("gpt-3.5-turbo")),
            "gpt-3.5-turbo"
        );
    }

    #[test]
    fn request_body_sends_single_user_message() {
        let body = ChatRequestBody {
            model: "gpt-4o-mini".to_string(),
            messages: vec![ChatMessage {
                role: "user",
                content: "hi",
            }],
            max_tokens: None,
            temperature: Some(0.2),
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "hi");
        assert!(json.get("max_tokens").is_none());
    }

    #[tokio::test]
    async fn generate_reads_first_choice() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/chat/completions")
                    .header("authorization", "Bearer test-key");
                then.status(200).json_body(serde_json::json!({
                    "id": "chatcmpl-1",
                    "model": "gpt-4o-mini-2024",
                    "choices": [{
                        "index": 0,
                        "message": {"role": "assistant", "content": "Standup is at 10am [1]."},
                        "finish_reason": "stop"
                    }]
                }));
            })
            .await;

        let provider = OpenAIProvider::new("test-key", server.base_url(), "gpt-4o-mini").unwrap();
        let resp = provider.generate(GenerateRequest::new("when is standup")).await.unwrap();

        mock.assert_async().await;
        assert_eq!(resp.content, "Standup is at 10am [1].");
        assert_eq!(resp.model.as_deref(), Some("gpt-4o-mini-2024"));
        assert_eq!(resp.finish_reason.as_deref(), Some("stop"));
    }

    #[tokio::test]
    async fn generate_does_not_retry_server_errors() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(503).body("overloaded");
            })
            .await;

        let provider = OpenAIProvider::new("test-key", server.base_url(), "gpt-4o-mini").unwrap();
        let err = provider.generate(GenerateRequest::new("hello")).await.unwrap_err();

        assert_eq!(mock.hits_async().await, 1);
        assert_eq!(
            err,
            ProviderError::HttpStatus {
                status: 503,
                body: "overloaded".to_string()
            }
        );
    }
}
