//! Vector index trait and in-memory implementation

use async_trait::async_trait;
use recall_core::Namespace;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::error::{VectorError, VectorResult};
use crate::types::{cosine_similarity, IndexMatch, IndexQuery, IndexRecord};

/// Namespaced vector index.
///
/// Upserts overwrite by id; deleting an unknown id succeeds. Per-key
/// operations must be safe under concurrent use.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or overwrite records. Returns the number of records written.
    async fn upsert(&self, namespace: Namespace, records: Vec<IndexRecord>) -> VectorResult<usize>;

    /// Similarity search, best match first.
    async fn query(&self, namespace: Namespace, query: IndexQuery) -> VectorResult<Vec<IndexMatch>>;

    /// Remove the record with this id, if any.
    async fn delete_by_id(&self, namespace: Namespace, id: Uuid) -> VectorResult<()>;

    /// Whether a record with this id is currently visible to queries.
    async fn contains(&self, namespace: Namespace, id: Uuid) -> VectorResult<bool>;

    /// Dimension shared by every namespace.
    fn dimension(&self) -> usize;

    fn backend_name(&self) -> &'static str;
}

/// Checks every backend runs before touching storage.
pub fn validate_query(namespace: Namespace, query: &IndexQuery, dimension: usize) -> VectorResult<()> {
    if namespace.requires_owner_filter() && query.filter.owner_id.is_none() {
        return Err(VectorError::MissingOwnerFilter { namespace });
    }
    if query.top_k == 0 {
        return Err(VectorError::InvalidQuery("top_k must be at least 1".to_string()));
    }
    if query.vector.len() != dimension {
        return Err(VectorError::invalid_dimension(dimension, query.vector.len()));
    }
    Ok(())
}

pub(crate) fn validate_records(
    namespace: Namespace,
    records: &[IndexRecord],
    dimension: usize,
) -> VectorResult<()> {
    for record in records {
        if record.namespace != namespace {
            return Err(VectorError::NamespaceMismatch {
                id: record.id,
                expected: namespace,
                actual: record.namespace,
            });
        }
        if record.vector.len() != dimension {
            return Err(VectorError::invalid_dimension(dimension, record.vector.len()));
        }
    }
    Ok(())
}

/// In-memory vector index
#[derive(Clone)]
pub struct InMemoryVectorIndex {
    records: Arc<RwLock<HashMap<(Namespace, Uuid), IndexRecord>>>,
    dimension: usize,
}

impl InMemoryVectorIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
            dimension,
        }
    }

    /// Number of records stored in a namespace.
    pub async fn len(&self, namespace: Namespace) -> usize {
        self.records
            .read()
            .await
            .keys()
            .filter(|(ns, _)| *ns == namespace)
            .count()
    }

    pub async fn is_empty(&self, namespace: Namespace) -> bool {
        self.len(namespace).await == 0
    }

    pub async fn get(&self, namespace: Namespace, id: Uuid) -> VectorResult<IndexRecord> {
        self.records
            .read()
            .await
            .get(&(namespace, id))
            .cloned()
            .ok_or_else(|| VectorError::NotFound(id.to_string()))
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn upsert(&self, namespace: Namespace, records: Vec<IndexRecord>) -> VectorResult<usize> {
        validate_records(namespace, &records, self.dimension)?;

        let count = records.len();
        let mut store = self.records.write().await;
        for record in records {
            store.insert((namespace, record.id), record);
        }

        debug!(namespace = %namespace, count, "Records upserted");
        Ok(count)
    }

    async fn query(&self, namespace: Namespace, query: IndexQuery) -> VectorResult<Vec<IndexMatch>> {
        validate_query(namespace, &query, self.dimension)?;

        let store = self.records.read().await;
        let mut matches: Vec<IndexMatch> = store
            .iter()
            .filter(|((ns, _), record)| *ns == namespace && query.filter.matches(&record.metadata))
            .map(|(_, record)| IndexMatch {
                id: record.id,
                score: cosine_similarity(&query.vector, &record.vector),
                metadata: record.metadata.clone(),
            })
            .collect();

        matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        matches.truncate(query.top_k);

        Ok(matches)
    }

    async fn delete_by_id(&self, namespace: Namespace, id: Uuid) -> VectorResult<()> {
        let removed = self.records.write().await.remove(&(namespace, id)).is_some();
        debug!(namespace = %namespace, id = %id, removed, "Record deleted");
        Ok(())
    }

    async fn contains(&self, namespace: Namespace, id: Uuid) -> VectorResult<bool> {
        Ok(self.records.read().await.contains_key(&(namespace, id)))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
