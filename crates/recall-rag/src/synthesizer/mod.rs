//! Answer synthesis: retrieved fragments in, cited natural-language answer out.

use std::time::Instant;

use recall_runtime::{AIProvider, GenerateRequest};
use tracing::{debug, error};

use crate::error::RagResult;

pub mod open;
pub mod persona;

pub use open::{OpenQaSynthesizer, Source, SynthesizedAnswer};
pub use persona::{ContextDocument, PersonaAnswer, PersonaSynthesizer};

/// Answer returned to callers when generation fails.
pub const FALLBACK_ANSWER: &str =
    "Sorry, I couldn't put together an answer right now. Please try again in a moment.";

#[derive(Debug, Clone)]
pub struct SynthesizerConfig {
    /// Fragments retrieved for open questions
    pub open_top_k: usize,
    /// Documents retrieved for persona questions
    pub persona_top_k: usize,
    /// Sources below this score are left out of open answers
    pub min_source_score: f32,
    /// Most sources listed with an open answer
    pub max_sources: usize,
    /// Longest persona excerpt, in characters
    pub excerpt_chars: usize,
    /// Generative model override; the provider default when unset
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl Default for SynthesizerConfig {
    fn default() -> Self {
        Self {
            open_top_k: 5,
            persona_top_k: 3,
            min_source_score: 0.3,
            max_sources: 3,
            excerpt_chars: 1000,
            model: None,
            max_tokens: None,
            temperature: Some(0.3),
        }
    }
}

impl SynthesizerConfig {
    fn request(&self, prompt: String) -> GenerateRequest {
        let mut req = GenerateRequest::new(prompt);
        if let Some(ref model) = self.model {
            req = req.with_model(model.clone());
        }
        if let Some(max_tokens) = self.max_tokens {
            req = req.with_max_tokens(max_tokens);
        }
        if let Some(temperature) = self.temperature {
            req = req.with_temperature(temperature);
        }
        req
    }
}

/// One generation call. Failures are returned as-is; generation is never
/// retried.
pub(crate) async fn generate(provider: &dyn AIProvider, config: &SynthesizerConfig, prompt: String) -> RagResult<String> {
    let started = Instant::now();
    let response = provider.generate(config.request(prompt)).await.map_err(|e| {
        error!(provider = provider.name(), error = %e, "Answer generation failed");
        e
    })?;

    debug!(
        provider = provider.name(),
        elapsed_ms = started.elapsed().as_millis(),
        finish_reason = ?response.finish_reason,
        "Answer generated"
    );
    Ok(response.content.trim().to_string())
}
