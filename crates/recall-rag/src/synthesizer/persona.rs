//! Persona Q&A: first-person answers grounded in one owner's documents.
//!
//! The documents placed in the prompt are kept as [`ContextDocument`]s and
//! returned with the answer, so the citation list is exactly what the model
//! was shown.

use std::fmt::Write as _;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use recall_runtime::AIProvider;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::{generate, SynthesizerConfig};
use crate::error::RagResult;
use crate::persona::Persona;
use crate::retriever::{RetrievalResult, Retriever, SearchScope};

const NO_CONTEXT: &str = "No relevant documents were found in your knowledge base.";

/// One document as it was presented to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextDocument {
    /// 1-based position in the prompt
    pub index: usize,
    pub document_id: Uuid,
    pub document_name: String,
    pub document_type: String,
    pub created_at: DateTime<Utc>,
    pub relevance_score: f32,
    pub excerpt: String,
}

impl ContextDocument {
    fn from_result(index: usize, result: &RetrievalResult, excerpt_chars: usize) -> Self {
        let metadata = &result.metadata;
        Self {
            index,
            document_id: result.id,
            document_name: metadata
                .document_name
                .clone()
                .unwrap_or_else(|| "Untitled document".to_string()),
            document_type: document_type(metadata.mime_type.as_deref().unwrap_or_default()).to_string(),
            created_at: metadata.created_at,
            relevance_score: result.score,
            excerpt: excerpt(&metadata.content, excerpt_chars),
        }
    }

    fn render(&self) -> String {
        format!(
            "[{}] Document: {}\nType: {}\nCreated: {}\nRelevance: {:.2}\nExcerpt: {}",
            self.index,
            self.document_name,
            self.document_type,
            self.created_at.format("%Y-%m-%d"),
            self.relevance_score,
            self.excerpt
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonaAnswer {
    /// Answer followed by the numbered source list
    pub formatted_answer: String,
    pub answer: String,
    pub relevant_documents: Vec<ContextDocument>,
}

#[derive(Clone)]
pub struct PersonaSynthesizer {
    retriever: Retriever,
    provider: Arc<dyn AIProvider>,
    config: SynthesizerConfig,
}

impl PersonaSynthesizer {
    pub fn new(retriever: Retriever, provider: Arc<dyn AIProvider>, config: SynthesizerConfig) -> Self {
        Self {
            retriever,
            provider,
            config,
        }
    }

    pub async fn answer(&self, query: &str, persona: &Persona) -> RagResult<PersonaAnswer> {
        let results = self
            .retriever
            .similarity_search(
                query,
                SearchScope::Persona { owner_id: persona.id },
                self.config.persona_top_k,
            )
            .await?;

        let documents: Vec<ContextDocument> = results
            .iter()
            .enumerate()
            .map(|(i, result)| ContextDocument::from_result(i + 1, result, self.config.excerpt_chars))
            .collect();

        let prompt = build_prompt(query, persona, &build_context(&documents));
        let answer = generate(self.provider.as_ref(), &self.config, prompt).await?;

        info!(
            persona_id = %persona.id,
            documents = documents.len(),
            "Persona question answered"
        );
        Ok(PersonaAnswer {
            formatted_answer: format_answer(&answer, &documents),
            answer,
            relevant_documents: documents,
        })
    }
}

pub fn build_context(documents: &[ContextDocument]) -> String {
    if documents.is_empty() {
        return NO_CONTEXT.to_string();
    }
    documents
        .iter()
        .map(ContextDocument::render)
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn build_prompt(query: &str, persona: &Persona, context: &str) -> String {
    let bio = persona
        .bio
        .as_deref()
        .filter(|bio| !bio.trim().is_empty())
        .unwrap_or("No bio provided.");

    format!(
        "You are {name}. Answer the question below in the first person, as {name} would.\n\
\n\
About you: {bio}\n\
\n\
Rules:\n\
- Speak only as yourself (\"I\", \"my\"); never refer to yourself in the third person.\n\
- Use only the knowledge in the documents below. Do not draw on outside knowledge.\n\
- If the documents only partly answer the question, say what you are unsure about.\n\
- If the documents do not cover the question, say you don't know rather than guessing.\n\
- Match the tone suggested by your bio.\n\
\n\
Your documents:\n\
{context}\n\
\n\
Question: {query}\n\
\n\
Answer:",
        name = persona.display_name,
    )
}

/// The answer followed by a numbered list of the documents it drew on.
pub fn format_answer(answer: &str, documents: &[ContextDocument]) -> String {
    if documents.is_empty() {
        return answer.to_string();
    }

    let mut formatted = format!("{answer}\n\nSources:");
    for doc in documents {
        let _ = write!(
            formatted,
            "\n{}. {} ({}, relevance {:.2})",
            doc.index, doc.document_name, doc.document_type, doc.relevance_score
        );
    }
    formatted
}

/// Human-readable document type for a MIME type.
pub fn document_type(mime_type: &str) -> &'static str {
    let essence = mime_type.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    match essence.as_str() {
        "application/pdf" => "PDF document",
        "text/markdown" | "text/x-markdown" => "Markdown document",
        "text/csv" => "CSV spreadsheet",
        "application/msword" | "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
            "Word document"
        }
        "application/rtf" | "text/rtf" => "Rich text document",
        "text/plain" => "Text document",
        _ => "Document",
    }
}

/// At most `max_chars` characters of `text`, cut after the last complete
/// sentence when that keeps at least half the budget, otherwise at a word
/// boundary with an ellipsis. Only `.`, `!` or `?` followed by whitespace ends
/// a sentence, so a decimal point never does.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let head: String = text.chars().take(max_chars).collect();
    let sentence_end = head
        .char_indices()
        .filter(|&(i, c)| {
            let after = i + c.len_utf8();
            matches!(c, '.' | '!' | '?') && text[after..].starts_with(char::is_whitespace)
        })
        .map(|(i, c)| i + c.len_utf8())
        .last();
    if let Some(end) = sentence_end {
        if head[..end].chars().count() * 2 >= max_chars {
            return head[..end].to_string();
        }
    }

    let budget: String = head.chars().take(max_chars.saturating_sub(3)).collect();
    let cut = budget.rfind(char::is_whitespace).unwrap_or(budget.len());
    format!("{}...", budget[..cut].trim_end())
}
