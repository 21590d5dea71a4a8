//! Open Q&A over chat history.

use std::fmt::Write as _;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use recall_runtime::AIProvider;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::{generate, SynthesizerConfig};
use crate::error::RagResult;
use crate::retriever::{RetrievalResult, Retriever, SearchScope};

const NO_CONTEXT: &str = "No relevant messages were found in the conversation history.";

/// A retrieved message listed alongside an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub owner_id: Uuid,
    pub scope_id: Option<Uuid>,
    pub score: f32,
    pub is_edited: bool,
}

impl From<&RetrievalResult> for Source {
    fn from(result: &RetrievalResult) -> Self {
        Self {
            content: result.metadata.content.clone(),
            created_at: result.metadata.created_at,
            owner_id: result.metadata.owner_id,
            scope_id: result.metadata.scope_id,
            score: result.score,
            is_edited: result.metadata.is_edited,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthesizedAnswer {
    pub answer: String,
    pub sources: Vec<Source>,
}

#[derive(Clone)]
pub struct OpenQaSynthesizer {
    retriever: Retriever,
    provider: Arc<dyn AIProvider>,
    config: SynthesizerConfig,
}

impl OpenQaSynthesizer {
    pub fn new(retriever: Retriever, provider: Arc<dyn AIProvider>, config: SynthesizerConfig) -> Self {
        Self {
            retriever,
            provider,
            config,
        }
    }

    pub async fn answer(&self, query: &str, channel_id: Option<Uuid>) -> RagResult<SynthesizedAnswer> {
        let results = self
            .retriever
            .similarity_search(query, SearchScope::Open { channel_id }, self.config.open_top_k)
            .await?;

        let context = build_context(&results);
        let answer = generate(self.provider.as_ref(), &self.config, build_prompt(query, &context)).await?;
        let sources = select_sources(&results, self.config.min_source_score, self.config.max_sources);

        info!(
            channel_id = ?channel_id,
            retrieved = results.len(),
            sources = sources.len(),
            "Open question answered"
        );
        Ok(SynthesizedAnswer { answer, sources })
    }
}

/// Numbered context lines, oldest message first, so citation numbers follow
/// the conversation's order rather than the ranking.
pub fn build_context(results: &[RetrievalResult]) -> String {
    if results.is_empty() {
        return NO_CONTEXT.to_string();
    }

    let mut ordered: Vec<&RetrievalResult> = results.iter().collect();
    ordered.sort_by_key(|r| r.created_at());

    let mut context = String::new();
    for (i, result) in ordered.iter().enumerate() {
        let _ = writeln!(
            context,
            "[{}] [{}] \"{}\" (relevance: {:.2})",
            i + 1,
            result.created_at().to_rfc3339_opts(SecondsFormat::Secs, true),
            result.metadata.content,
            result.score
        );
    }
    context.trim_end().to_string()
}

pub fn build_prompt(query: &str, context: &str) -> String {
    format!(
        "You answer questions about a team's conversation history using only the \
numbered message fragments below.\n\
\n\
Instructions:\n\
- Use ALL fragments that are relevant, not just the first or highest scoring one.\n\
- Cite fragments with their bracketed numbers, e.g. [1] or [2][3]; the numbers follow chronological order.\n\
- When several fragments each cover part of the answer, combine them into one answer.\n\
- If fragments contradict each other, say so and cite both sides.\n\
- If the fragments do not contain enough information, say clearly that the history does not answer the question.\n\
\n\
Conversation fragments:\n\
{context}\n\
\n\
Question: {query}\n\
\n\
Answer:"
    )
}

/// Sources are picked from the ranked results after generation; they
/// approximate, but do not verify, what the answer cited.
pub fn select_sources(results: &[RetrievalResult], min_score: f32, max_sources: usize) -> Vec<Source> {
    results
        .iter()
        .filter(|r| r.score >= min_score)
        .take(max_sources)
        .map(Source::from)
        .collect()
}
