//! Gateway configuration, read from the environment.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context};
use recall_ingest::ReadinessConfig;
use recall_runtime::embedding::openai::DEFAULT_MODEL as DEFAULT_EMBEDDING_MODEL;
use recall_runtime::providers::openai::{DEFAULT_MODEL as DEFAULT_CHAT_MODEL, OPENAI_API_BASE};
use recall_runtime::EmbedderConfig;
use recall_vector::UpsertBatching;

#[derive(Debug, Clone)]
pub struct OpenAiSettings {
    pub api_key: String,
    pub api_base: String,
    pub embedding_model: String,
    pub default_model: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QdrantSettings {
    pub url: String,
    pub api_key: Option<String>,
    pub collection_prefix: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlobSettings {
    Local { root: PathBuf },
    Http { base_url: String, token: Option<String> },
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub bind_addr: SocketAddr,
    pub webhook_secret: String,
    pub json_logs: bool,
    pub openai: OpenAiSettings,
    pub embedder: EmbedderConfig,
    pub upsert: UpsertBatching,
    pub readiness: ReadinessConfig,
    pub qdrant: Option<QdrantSettings>,
    pub database_url: Option<String>,
    pub blobs: BlobSettings,
}

impl GatewayConfig {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        // A missing .env file is normal outside development.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let webhook_secret = env.required("RECALL_WEBHOOK_SECRET")?;
        let openai = OpenAiSettings {
            api_key: env.required("OPENAI_API_KEY")?,
            api_base: env.string_or("OPENAI_API_BASE", OPENAI_API_BASE),
            embedding_model: env.string_or("OPENAI_EMBEDDING_MODEL", DEFAULT_EMBEDDING_MODEL),
            default_model: env.string_or("OPENAI_DEFAULT_MODEL", DEFAULT_CHAT_MODEL),
        };

        let embedder = EmbedderConfig::default().with_batching(
            env.parse_or("RECALL_EMBED_BATCH_SIZE", 20)?,
            Duration::from_millis(env.parse_or("RECALL_EMBED_BATCH_DELAY_MS", 1000)?),
        );
        let upsert = UpsertBatching::new(
            env.parse_or("RECALL_UPSERT_BATCH_SIZE", 100)?,
            Duration::from_millis(env.parse_or("RECALL_UPSERT_BATCH_DELAY_MS", 500)?),
        );
        let readiness = ReadinessConfig {
            attempts: env.parse_or("RECALL_READINESS_ATTEMPTS", 5)?,
            delay: Duration::from_millis(env.parse_or("RECALL_READINESS_DELAY_MS", 200)?),
        };

        let qdrant = env.optional("RECALL_QDRANT_URL").map(|url| QdrantSettings {
            url,
            api_key: env.optional("RECALL_QDRANT_API_KEY"),
            collection_prefix: env.string_or("RECALL_QDRANT_COLLECTION_PREFIX", "recall"),
        });

        let blobs = match env.optional("RECALL_BLOB_BASE_URL") {
            Some(base_url) => BlobSettings::Http {
                base_url,
                token: env.optional("RECALL_BLOB_TOKEN"),
            },
            None => BlobSettings::Local {
                root: PathBuf::from(env.string_or("RECALL_BLOB_ROOT", "./data/blobs")),
            },
        };

        Ok(Self {
            bind_addr: env.parse_or("RECALL_BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 8080)))?,
            webhook_secret,
            json_logs: env.optional("RECALL_LOG_FORMAT").is_some_and(|f| f.eq_ignore_ascii_case("json")),
            openai,
            embedder,
            upsert,
            readiness,
            qdrant,
            database_url: env.optional("DATABASE_URL"),
            blobs,
        })
    }
}

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Set and non-blank.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
    }

    fn required(&self, key: &str) -> anyhow::Result<String> {
        match self.optional(key) {
            Some(value) => Ok(value),
            None => bail!("{key} must be set"),
        }
    }

    fn string_or(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    fn parse_or<T>(&self, key: &str, default: T) -> anyhow::Result<T>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        match self.optional(key) {
            Some(raw) => raw.parse().with_context(|| format!("invalid value for {key}: {raw:?}")),
            None => Ok(default),
        }
    }
}
