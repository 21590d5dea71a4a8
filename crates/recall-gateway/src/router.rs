//! HTTP routes for the Recall gateway

use axum::extract::{Path, Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use recall_core::{ChangeEvent, Document, EventType, Message};
use recall_ingest::{IndexOutcome, IngestError, IngestResult};
use recall_rag::{Persona, PersonaAnswer, RagError, SynthesizedAnswer, FALLBACK_ANSWER};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;
use uuid::Uuid;

use crate::error::{GatewayError, GatewayResult};
use crate::metrics;
use crate::state::AppState;

pub const WEBHOOK_SECRET_HEADER: &str = "x-webhook-secret";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookResponse {
    pub status: String,
    pub outcome: String,
    pub id: Uuid,
}

impl From<IndexOutcome> for HookResponse {
    fn from(outcome: IndexOutcome) -> Self {
        Self {
            status: "processed".to_string(),
            outcome: outcome.as_str().to_string(),
            id: outcome.id(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AskRequest {
    pub query: String,
    #[serde(default)]
    pub channel_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonaAskRequest {
    pub query: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonaProfile {
    pub display_name: String,
    #[serde(default)]
    pub bio: Option<String>,
}

/// Routes with their state attached.
pub fn build_routes(state: AppState) -> Router {
    let protected = Router::new()
        .route("/v1/hooks/messages", post(message_hook))
        .route("/v1/hooks/documents", post(document_hook))
        .route("/v1/documents/:id/reindex", post(reindex_document))
        .route("/v1/personas/:id", put(upsert_persona))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_webhook_secret));

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        .route("/v1/ask", post(ask))
        .route("/v1/personas/:id/ask", post(ask_persona))
        .merge(protected)
        .with_state(state)
}

/// Routes plus CORS and request tracing.
pub fn build_app(state: AppState) -> Router {
    build_routes(state)
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
}

async fn health_check() -> &'static str {
    "OK"
}

async fn metrics_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::export(),
    )
}

async fn require_webhook_secret(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let provided = request
        .headers()
        .get(WEBHOOK_SECRET_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    if !constant_time_eq(provided.as_bytes(), state.webhook_secret().as_bytes()) {
        warn!(path = %request.uri().path(), "Rejected request with bad webhook secret");
        return GatewayError::Unauthorized.into_response();
    }
    next.run(request).await
}

/// Compares without short-circuiting on the first differing byte.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

async fn message_hook(
    State(state): State<AppState>,
    Json(event): Json<ChangeEvent<Message>>,
) -> GatewayResult<Json<HookResponse>> {
    let event_type = event.event_type;
    let timer = metrics::INDEXING_LATENCY.with_label_values(&["messages"]).start_timer();
    let result = state.pipeline.handle_message_event(event).await;
    timer.observe_duration();

    record_event("messages", event_type, &result);
    Ok(Json(result?.into()))
}

async fn document_hook(
    State(state): State<AppState>,
    Json(event): Json<ChangeEvent<Document>>,
) -> GatewayResult<Json<HookResponse>> {
    let event_type = event.event_type;
    let timer = metrics::INDEXING_LATENCY.with_label_values(&["documents"]).start_timer();
    let result = state.pipeline.handle_document_event(event).await;
    timer.observe_duration();

    record_event("documents", event_type, &result);
    record_document_status(&result);
    Ok(Json(result?.into()))
}

async fn reindex_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> GatewayResult<(StatusCode, Json<serde_json::Value>)> {
    let result = state.pipeline.reprocess_document(id).await;
    record_document_status(&result);
    result?;

    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "status": "completed", "id": id })),
    ))
}

async fn upsert_persona(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(profile): Json<PersonaProfile>,
) -> GatewayResult<Json<Persona>> {
    let persona = Persona {
        id,
        display_name: profile.display_name,
        bio: profile.bio,
    };
    state.personas.put_persona(persona.clone()).await?;
    Ok(Json(persona))
}

async fn ask(State(state): State<AppState>, Json(req): Json<AskRequest>) -> GatewayResult<Response> {
    let timer = metrics::QUESTION_LATENCY.with_label_values(&["open"]).start_timer();
    let result = state.rag.ask_question(&req.query, req.channel_id).await;
    timer.observe_duration();

    match result {
        Ok(answer) => {
            metrics::QUESTIONS_TOTAL.with_label_values(&["open", "answered"]).inc();
            Ok(Json(answer).into_response())
        }
        Err(RagError::Generation(e)) => {
            metrics::QUESTIONS_TOTAL.with_label_values(&["open", "generation"]).inc();
            warn!(error = %e, "Returning fallback answer");
            let fallback = SynthesizedAnswer {
                answer: FALLBACK_ANSWER.to_string(),
                sources: Vec::new(),
            };
            Ok((StatusCode::BAD_GATEWAY, Json(fallback)).into_response())
        }
        Err(e) => {
            metrics::QUESTIONS_TOTAL.with_label_values(&["open", e.kind()]).inc();
            Err(e.into())
        }
    }
}

async fn ask_persona(
    State(state): State<AppState>,
    Path(persona_id): Path<Uuid>,
    Json(req): Json<PersonaAskRequest>,
) -> GatewayResult<Response> {
    let timer = metrics::QUESTION_LATENCY.with_label_values(&["persona"]).start_timer();
    let result = state.rag.ask_persona_question(&req.query, persona_id).await;
    timer.observe_duration();

    match result {
        Ok(answer) => {
            metrics::QUESTIONS_TOTAL.with_label_values(&["persona", "answered"]).inc();
            Ok(Json(answer).into_response())
        }
        Err(RagError::Generation(e)) => {
            metrics::QUESTIONS_TOTAL.with_label_values(&["persona", "generation"]).inc();
            warn!(persona_id = %persona_id, error = %e, "Returning fallback answer");
            let fallback = PersonaAnswer {
                formatted_answer: FALLBACK_ANSWER.to_string(),
                answer: FALLBACK_ANSWER.to_string(),
                relevant_documents: Vec::new(),
            };
            Ok((StatusCode::BAD_GATEWAY, Json(fallback)).into_response())
        }
        Err(e) => {
            metrics::QUESTIONS_TOTAL.with_label_values(&["persona", e.kind()]).inc();
            Err(e.into())
        }
    }
}

fn record_event(stream: &str, event_type: EventType, result: &IngestResult<IndexOutcome>) {
    let outcome = match result {
        Ok(outcome) => outcome.as_str(),
        Err(e) => e.kind(),
    };
    metrics::EVENTS_TOTAL
        .with_label_values(&[stream, event_type.as_str(), outcome])
        .inc();
}

fn record_document_status(result: &IngestResult<IndexOutcome>) {
    match result {
        Ok(IndexOutcome::Indexed(_)) => {
            metrics::DOCUMENT_STATUS_TOTAL.with_label_values(&["completed", ""]).inc();
        }
        Err(
            e @ (IngestError::UnsupportedFormat { .. }
            | IngestError::Extraction { .. }
            | IngestError::Blob { .. }
            | IngestError::Embedding(_)
            | IngestError::VectorIndex(_)),
        ) => {
            metrics::DOCUMENT_STATUS_TOTAL.with_label_values(&["failed", e.kind()]).inc();
        }
        _ => {}
    }
}
