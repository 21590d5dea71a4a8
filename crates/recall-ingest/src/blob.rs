//! Read-only access to stored document bytes.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{IngestError, IngestResult};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Raw bytes stored at `path`.
    async fn fetch(&self, path: &str) -> IngestResult<Bytes>;
}

/// Blobs laid out under a local directory.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> IngestResult<PathBuf> {
        let relative = Path::new(path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(IngestError::blob(path, "path escapes blob root"));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn fetch(&self, path: &str) -> IngestResult<Bytes> {
        let full = self.resolve(path)?;
        let data = tokio::fs::read(&full)
            .await
            .map_err(|e| IngestError::blob(path, e))?;
        debug!(path, bytes = data.len(), "Blob read from disk");
        Ok(Bytes::from(data))
    }
}

/// Blobs served over HTTP as `GET {base_url}/{path}`.
#[derive(Debug, Clone)]
pub struct HttpBlobStore {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpBlobStore {
    pub fn new(base_url: impl Into<String>) -> IngestResult<Self> {
        let base_url = base_url.into();
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| IngestError::blob(base_url.clone(), e))?;
        Ok(Self {
            client,
            base_url,
            token: None,
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn fetch(&self, path: &str) -> IngestResult<Bytes> {
        let mut request = self.client.get(self.url(path));
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| IngestError::blob(path, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(IngestError::blob(path, format!("HTTP {}", status.as_u16())));
        }

        let data = response.bytes().await.map_err(|e| IngestError::blob(path, e))?;
        debug!(path, bytes = data.len(), "Blob downloaded");
        Ok(data)
    }
}

/// In-memory blob store
#[derive(Debug, Clone, Default)]
pub struct InMemoryBlobStore {
    blobs: Arc<RwLock<HashMap<String, Bytes>>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, path: impl Into<String>, data: impl Into<Bytes>) {
        self.blobs.write().await.insert(path.into(), data.into());
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn fetch(&self, path: &str) -> IngestResult<Bytes> {
        self.blobs
            .read()
            .await
            .get(path)
            .cloned()
            .ok_or_else(|| IngestError::blob(path, "not found"))
    }
}
