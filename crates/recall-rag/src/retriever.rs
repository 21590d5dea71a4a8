//! Similarity search over the vector index.
//!
//! Open search ranks chat messages, optionally scoped to one channel, and
//! applies no relevance floor. Persona search is always restricted to one
//! owner's documents, over-fetches, drops weak matches, and retries an empty
//! result a bounded number of times to ride out index visibility lag.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use recall_core::{Namespace, RetryConfig, RetryPolicy};
use recall_runtime::Embedder;
use recall_vector::{IndexMatch, IndexQuery, RecordFilter, RecordMetadata, VectorIndex};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::{RagError, RagResult};

#[derive(Debug, Clone)]
pub struct RetrieverConfig {
    /// Matches scoring below this are dropped from persona results
    pub persona_min_score: f32,
    /// Persona queries ask the index for `limit * persona_overfetch` matches
    pub persona_overfetch: usize,
    /// Re-query policy when no persona match survives filtering
    pub persona_empty_retry: RetryConfig,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            persona_min_score: 0.1,
            persona_overfetch: 2,
            persona_empty_retry: RetryConfig::constant(2, Duration::from_secs(1)),
        }
    }
}

/// Where a search looks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    /// Chat messages, optionally within one channel
    Open { channel_id: Option<Uuid> },
    /// Knowledge documents owned by one persona
    Persona { owner_id: Uuid },
}

impl SearchScope {
    pub fn namespace(&self) -> Namespace {
        match self {
            SearchScope::Open { .. } => Namespace::Messages,
            SearchScope::Persona { .. } => Namespace::AvatarDocuments,
        }
    }

    fn filter(&self) -> RecordFilter {
        match self {
            SearchScope::Open { channel_id: Some(channel_id) } => RecordFilter::scope(*channel_id),
            SearchScope::Open { channel_id: None } => RecordFilter::new(),
            SearchScope::Persona { owner_id } => RecordFilter::owner(*owner_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub id: Uuid,
    pub score: f32,
    pub metadata: RecordMetadata,
}

impl RetrievalResult {
    pub fn created_at(&self) -> DateTime<Utc> {
        self.metadata.created_at
    }
}

impl From<IndexMatch> for RetrievalResult {
    fn from(m: IndexMatch) -> Self {
        Self {
            id: m.id,
            score: m.score,
            metadata: m.metadata,
        }
    }
}

#[derive(Clone)]
pub struct Retriever {
    embedder: Embedder,
    index: Arc<dyn VectorIndex>,
    config: RetrieverConfig,
}

impl Retriever {
    pub fn new(embedder: Embedder, index: Arc<dyn VectorIndex>) -> Self {
        Self {
            embedder,
            index,
            config: RetrieverConfig::default(),
        }
    }

    pub fn with_config(mut self, config: RetrieverConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &RetrieverConfig {
        &self.config
    }

    /// Results are deduplicated by id, best first, at most `limit` long.
    pub async fn similarity_search(
        &self,
        query: &str,
        scope: SearchScope,
        limit: usize,
    ) -> RagResult<Vec<RetrievalResult>> {
        if query.trim().is_empty() {
            return Err(RagError::InvalidQuery("Query cannot be empty".to_string()));
        }
        if limit == 0 {
            return Err(RagError::InvalidQuery("Limit must be at least 1".to_string()));
        }

        let vector = self.embedder.embed_query(query).await?;

        match scope {
            SearchScope::Open { .. } => self.search_once(&vector, scope, limit, limit, None).await,
            SearchScope::Persona { owner_id } => {
                let top_k = limit.saturating_mul(self.config.persona_overfetch.max(1));
                let floor = Some(self.config.persona_min_score);
                let mut policy = RetryPolicy::new(self.config.persona_empty_retry);

                loop {
                    let results = self.search_once(&vector, scope, top_k, limit, floor).await?;
                    if !results.is_empty() {
                        return Ok(results);
                    }
                    let Some(delay) = policy.next_delay() else {
                        debug!(owner_id = %owner_id, "No persona documents matched");
                        return Ok(results);
                    };
                    debug!(
                        owner_id = %owner_id,
                        attempt = policy.attempt(),
                        delay_ms = delay.as_millis(),
                        "Persona search empty, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn search_once(
        &self,
        vector: &[f32],
        scope: SearchScope,
        top_k: usize,
        limit: usize,
        min_score: Option<f32>,
    ) -> RagResult<Vec<RetrievalResult>> {
        let namespace = scope.namespace();
        let query = IndexQuery::new(vector.to_vec(), top_k).with_filter(scope.filter());
        let matches = self.index.query(namespace, query).await?;
        let fetched = matches.len();

        let results = rank(matches, min_score, limit);
        debug!(
            namespace = %namespace,
            top_k,
            fetched,
            kept = results.len(),
            "Similarity search completed"
        );
        Ok(results)
    }
}

/// Keep the best match per id, drop those under `min_score`, sort best first
/// and truncate.
fn rank(matches: Vec<IndexMatch>, min_score: Option<f32>, limit: usize) -> Vec<RetrievalResult> {
    let mut best: HashMap<Uuid, IndexMatch> = HashMap::new();
    for m in matches {
        if min_score.is_some_and(|floor| m.score < floor) {
            continue;
        }
        let better = best.get(&m.id).map_or(true, |existing| m.score > existing.score);
        if better {
            best.insert(m.id, m);
        }
    }

    let mut results: Vec<RetrievalResult> = best.into_values().map(RetrievalResult::from).collect();
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    results.truncate(limit);
    results
}
