//! Recall Gateway - HTTP ingress for indexing and question answering
//!
//! This crate wires the ingestion pipeline and RAG service behind axum:
//! - Change-event webhooks from the source-of-truth store
//! - Open and persona question endpoints
//! - Persona profile registration
//! - Health and Prometheus metrics

pub mod config;
pub mod error;
pub mod metrics;
pub mod router;
pub mod state;

pub use config::{BlobSettings, GatewayConfig, OpenAiSettings, QdrantSettings};
pub use error::{GatewayError, GatewayResult};
pub use router::{build_app, build_routes, WEBHOOK_SECRET_HEADER};
pub use state::AppState;

/// Gateway version
pub const GATEWAY_VERSION: &str = env!("CARGO_PKG_VERSION");
