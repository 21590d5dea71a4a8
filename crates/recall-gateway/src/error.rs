//! HTTP error mapping

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use recall_ingest::IngestError;
use recall_rag::RagError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Missing or invalid webhook secret")]
    Unauthorized,

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Rag(#[from] RagError),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Unauthorized => StatusCode::UNAUTHORIZED,
            GatewayError::Ingest(err) => match err {
                IngestError::UnsupportedFormat { .. } | IngestError::Extraction { .. } => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                IngestError::DocumentNotFound(_) => StatusCode::NOT_FOUND,
                IngestError::InvalidEvent(_) => StatusCode::BAD_REQUEST,
                IngestError::InvalidTransition(_) => StatusCode::CONFLICT,
                IngestError::Blob { .. } | IngestError::Embedding(_) | IngestError::VectorIndex(_) => {
                    StatusCode::BAD_GATEWAY
                }
                IngestError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            GatewayError::Rag(err) => match err {
                RagError::InvalidQuery(_) => StatusCode::BAD_REQUEST,
                RagError::Directory(_) => StatusCode::INTERNAL_SERVER_ERROR,
                RagError::Embedding(_) | RagError::VectorIndex(_) | RagError::Generation(_) => StatusCode::BAD_GATEWAY,
            },
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Unauthorized => "unauthorized",
            GatewayError::Ingest(err) => err.kind(),
            GatewayError::Rag(err) => err.kind(),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(kind = self.kind(), error = %self, "Request failed");
        } else {
            tracing::debug!(kind = self.kind(), error = %self, "Request rejected");
        }

        let body = Json(json!({
            "error": self.to_string(),
            "kind": self.kind(),
        }));
        (status, body).into_response()
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;
