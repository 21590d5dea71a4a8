//! Qdrant vector index implementation
//!
//! Each namespace maps to its own collection, `{prefix}_{namespace}`, all
//! sharing one dimension and cosine distance.

use async_trait::async_trait;
use qdrant_client::qdrant::{
    point_id::PointIdOptions, Condition, CreateCollectionBuilder, CreateFieldIndexCollectionBuilder,
    DeletePointsBuilder, Distance, FieldType, Filter, GetPointsBuilder, PointId, PointStruct,
    PointsIdsList, ScoredPoint, SearchPointsBuilder, UpsertPointsBuilder, VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};
use recall_core::Namespace;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{VectorError, VectorResult};
use crate::index::{validate_query, validate_records, VectorIndex};
use crate::types::{IndexMatch, IndexQuery, IndexRecord, RecordFilter, RecordMetadata};

const BACKEND: &str = "qdrant";

/// Configuration for Qdrant connection
#[derive(Debug, Clone)]
pub struct QdrantConfig {
    /// Qdrant server URL
    pub url: String,
    /// Prefix for per-namespace collection names
    pub collection_prefix: String,
    /// Vector dimension
    pub dimension: usize,
    /// API key (optional)
    pub api_key: Option<String>,
    /// Connection timeout in seconds
    pub timeout_secs: u64,
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6334".to_string(),
            collection_prefix: "recall".to_string(),
            dimension: 1536,
            api_key: None,
            timeout_secs: 30,
        }
    }
}

impl QdrantConfig {
    pub fn new(url: impl Into<String>, collection_prefix: impl Into<String>, dimension: usize) -> Self {
        Self {
            url: url.into(),
            collection_prefix: collection_prefix.into(),
            dimension,
            ..Default::default()
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn collection_name(&self, namespace: Namespace) -> String {
        format!("{}_{}", self.collection_prefix, namespace.as_str())
    }
}

/// Qdrant-backed vector index
pub struct QdrantVectorIndex {
    client: Qdrant,
    config: QdrantConfig,
}

impl QdrantVectorIndex {
    /// Connect and make sure both namespace collections exist.
    pub async fn new(config: QdrantConfig) -> VectorResult<Self> {
        let mut builder = Qdrant::from_url(&config.url).timeout(Duration::from_secs(config.timeout_secs));
        if let Some(ref api_key) = config.api_key {
            builder = builder.api_key(api_key.clone());
        }

        let client = builder
            .build()
            .map_err(|e| VectorError::backend(BACKEND, e.to_string()))?;

        let index = Self { client, config };
        for namespace in Namespace::ALL {
            index.ensure_collection(namespace).await?;
        }

        info!(
            prefix = %index.config.collection_prefix,
            dimension = index.config.dimension,
            "Qdrant vector index initialized"
        );

        Ok(index)
    }

    async fn ensure_collection(&self, namespace: Namespace) -> VectorResult<()> {
        let name = self.config.collection_name(namespace);

        let exists = self
            .client
            .collection_exists(&name)
            .await
            .map_err(|e| VectorError::backend(BACKEND, e.to_string()))?;
        if exists {
            return Ok(());
        }

        info!(collection = %name, dimension = self.config.dimension, "Creating Qdrant collection");
        self.client
            .create_collection(
                CreateCollectionBuilder::new(&name).vectors_config(VectorParamsBuilder::new(
                    self.config.dimension as u64,
                    Distance::Cosine,
                )),
            )
            .await
            .map_err(|e| VectorError::backend(BACKEND, e.to_string()))?;

        for field in ["owner_id", "scope_id"] {
            self.client
                .create_field_index(CreateFieldIndexCollectionBuilder::new(&name, field, FieldType::Keyword))
                .await
                .map_err(|e| VectorError::backend(BACKEND, e.to_string()))?;
        }

        debug!(collection = %name, "Collection created");
        Ok(())
    }

    fn point_id(id: Uuid) -> PointId {
        PointId::from(id.to_string())
    }

    fn record_to_point(record: IndexRecord) -> VectorResult<PointStruct> {
        let payload = Payload::try_from(serde_json::to_value(&record.metadata)?)
            .map_err(|e| VectorError::backend(BACKEND, e.to_string()))?;
        Ok(PointStruct::new(Self::point_id(record.id), record.vector, payload))
    }

    fn build_filter(filter: &RecordFilter) -> Option<Filter> {
        let mut conditions = Vec::new();
        if let Some(owner_id) = filter.owner_id {
            conditions.push(Condition::matches("owner_id", owner_id.to_string()));
        }
        if let Some(scope_id) = filter.scope_id {
            conditions.push(Condition::matches("scope_id", scope_id.to_string()));
        }

        if conditions.is_empty() {
            None
        } else {
            Some(Filter::must(conditions))
        }
    }

    fn scored_to_match(point: ScoredPoint) -> VectorResult<IndexMatch> {
        let id = match point.id.and_then(|id| id.point_id_options) {
            Some(PointIdOptions::Uuid(uuid)) => Uuid::parse_str(&uuid)
                .map_err(|e| VectorError::backend(BACKEND, format!("Invalid UUID: {e}")))?,
            _ => return Err(VectorError::backend(BACKEND, "point without uuid id")),
        };

        let payload: serde_json::Map<String, serde_json::Value> = point
            .payload
            .into_iter()
            .map(|(key, value)| (key, value.into_json()))
            .collect();
        let metadata: RecordMetadata = serde_json::from_value(serde_json::Value::Object(payload))?;

        Ok(IndexMatch {
            id,
            score: point.score,
            metadata,
        })
    }
}

#[async_trait]
impl VectorIndex for QdrantVectorIndex {
    async fn upsert(&self, namespace: Namespace, records: Vec<IndexRecord>) -> VectorResult<usize> {
        validate_records(namespace, &records, self.config.dimension)?;
        if records.is_empty() {
            return Ok(0);
        }

        let count = records.len();
        let points = records
            .into_iter()
            .map(Self::record_to_point)
            .collect::<VectorResult<Vec<_>>>()?;

        self.client
            .upsert_points(UpsertPointsBuilder::new(self.config.collection_name(namespace), points).wait(true))
            .await
            .map_err(|e| VectorError::backend(BACKEND, e.to_string()))?;

        debug!(namespace = %namespace, count, "Records upserted to Qdrant");
        Ok(count)
    }

    async fn query(&self, namespace: Namespace, query: IndexQuery) -> VectorResult<Vec<IndexMatch>> {
        validate_query(namespace, &query, self.config.dimension)?;

        let mut request = SearchPointsBuilder::new(
            self.config.collection_name(namespace),
            query.vector,
            query.top_k as u64,
        )
        .with_payload(true);
        if let Some(filter) = Self::build_filter(&query.filter) {
            request = request.filter(filter);
        }

        let response = self
            .client
            .search_points(request)
            .await
            .map_err(|e| VectorError::backend(BACKEND, e.to_string()))?;

        let mut matches = Vec::with_capacity(response.result.len());
        for point in response.result {
            match Self::scored_to_match(point) {
                Ok(m) => matches.push(m),
                Err(e) => warn!(error = %e, "Skipping unreadable search hit"),
            }
        }

        Ok(matches)
    }

    async fn delete_by_id(&self, namespace: Namespace, id: Uuid) -> VectorResult<()> {
        self.client
            .delete_points(
                DeletePointsBuilder::new(self.config.collection_name(namespace))
                    .points(PointsIdsList {
                        ids: vec![Self::point_id(id)],
                    })
                    .wait(true),
            )
            .await
            .map_err(|e| VectorError::backend(BACKEND, e.to_string()))?;

        debug!(namespace = %namespace, id = %id, "Record deleted from Qdrant");
        Ok(())
    }

    async fn contains(&self, namespace: Namespace, id: Uuid) -> VectorResult<bool> {
        let response = self
            .client
            .get_points(
                GetPointsBuilder::new(self.config.collection_name(namespace), vec![Self::point_id(id)])
                    .with_payload(false)
                    .with_vectors(false),
            )
            .await
            .map_err(|e| VectorError::backend(BACKEND, e.to_string()))?;

        Ok(!response.result.is_empty())
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }

    fn backend_name(&self) -> &'static str {
        BACKEND
    }
}
