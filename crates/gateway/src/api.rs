//! Route handlers and request/response DTOs.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use tabletalk_agent::{ReasoningLoop, RenderedMessage};
use tabletalk_core::error::Error;
use tabletalk_core::grounding::TableId;
use tabletalk_core::turn::SessionId;
use tabletalk_grounding::{DatasetSummary, GroundingProvider};

// ── State ─────────────────────────────────────────────────────────────────

/// Shared state for the gateway.
pub struct GatewayState {
    pub runner: Arc<ReasoningLoop>,
    pub grounding: Arc<GroundingProvider>,
    pub sample_row_limit: usize,
    pub tables_cache_ttl: Duration,
    tables_cache: RwLock<Option<(DatasetSummary, Instant)>>,
}

impl GatewayState {
    pub fn new(
        runner: Arc<ReasoningLoop>,
        grounding: Arc<GroundingProvider>,
        sample_row_limit: usize,
        tables_cache_ttl: Duration,
    ) -> Self {
        Self {
            runner,
            grounding,
            sample_row_limit,
            tables_cache_ttl,
            tables_cache: RwLock::new(None),
        }
    }
}

pub type SharedState = Arc<GatewayState>;

// ── Router ────────────────────────────────────────────────────────────────

/// Build the gateway router.
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/api/chat", post(chat_handler))
        .route("/api/tables", get(list_tables_handler))
        .route("/api/tables/{name}", get(table_preview_handler))
        .route("/api/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── Request / Response types ──────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// Defaults to a shared single-user id when the caller has no auth.
    #[serde(default = "default_user_id")]
    pub user_id: String,

    /// Existing session id (omit on first call).
    #[serde(default)]
    pub session_id: Option<String>,

    pub message: InboundMessage,
}

fn default_user_id() -> String {
    "user_1".into()
}

#[derive(Debug, Deserialize)]
pub struct InboundMessage {
    #[serde(default)]
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub session_id: String,
    pub messages: Vec<RenderedMessage>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct TablesResponse {
    pub tables: Vec<String>,
    pub num_tables: usize,
    pub total_columns: u64,
    pub total_rows: u64,
}

// ── Handlers ──────────────────────────────────────────────────────────────

async fn chat_handler(
    State(state): State<SharedState>,
    Json(request): Json<ChatRequest>,
) -> (StatusCode, Json<serde_json::Value>) {
    handle_chat(state, request).await
}

/// Chat logic, separated from the axum extractor layer for testability.
pub async fn handle_chat(
    state: SharedState,
    request: ChatRequest,
) -> (StatusCode, Json<serde_json::Value>) {
    if request.message.content.trim().is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "message content must not be empty",
        );
    }

    let session_id = request.session_id.as_deref().map(SessionId::from);
    let result = state
        .runner
        .handle_message(
            &request.user_id,
            session_id.as_ref(),
            &request.message.content,
        )
        .await;

    match result {
        Ok(outcome) => {
            let body = ChatResponse {
                session_id: outcome.session_id.to_string(),
                messages: outcome.messages,
            };
            (
                StatusCode::OK,
                Json(serde_json::to_value(body).unwrap_or_default()),
            )
        }
        Err(e) => {
            warn!(error = %e, "Chat request failed");
            error_response(status_for(&e), &e.user_message())
        }
    }
}

async fn list_tables_handler(
    State(state): State<SharedState>,
) -> (StatusCode, Json<serde_json::Value>) {
    handle_list_tables(state).await
}

/// Tables summary with in-process TTL caching.
pub async fn handle_list_tables(state: SharedState) -> (StatusCode, Json<serde_json::Value>) {
    {
        let cache = state.tables_cache.read().await;
        if let Some((summary, at)) = cache.as_ref() {
            if at.elapsed() < state.tables_cache_ttl {
                return tables_response(summary);
            }
        }
    }

    match state.grounding.dataset_summary().await {
        Ok(summary) => {
            info!(
                num_tables = summary.num_tables,
                "Refreshed dataset summary"
            );
            let response = tables_response(&summary);
            *state.tables_cache.write().await = Some((summary, Instant::now()));
            response
        }
        Err(e) => {
            warn!(error = %e, "Failed to summarize dataset");
            error_response(status_for(&e), &e.user_message())
        }
    }
}

fn tables_response(summary: &DatasetSummary) -> (StatusCode, Json<serde_json::Value>) {
    let body = TablesResponse {
        tables: summary.tables.clone(),
        num_tables: summary.num_tables,
        total_columns: summary.total_columns,
        total_rows: summary.total_rows,
    };
    (
        StatusCode::OK,
        Json(serde_json::to_value(body).unwrap_or_default()),
    )
}

async fn table_preview_handler(
    State(state): State<SharedState>,
    Path(name): Path<String>,
) -> (StatusCode, Json<serde_json::Value>) {
    handle_table_preview(state, name).await
}

pub async fn handle_table_preview(
    state: SharedState,
    name: String,
) -> (StatusCode, Json<serde_json::Value>) {
    let table = TableId::from(&name);
    match state
        .grounding
        .table_preview(&table, state.sample_row_limit)
        .await
    {
        Ok(preview) => (
            StatusCode::OK,
            Json(serde_json::to_value(preview).unwrap_or_default()),
        ),
        Err(e) => {
            warn!(table = %name, error = %e, "Table preview failed");
            error_response(status_for(&e), &e.user_message())
        }
    }
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

// ── Error mapping ─────────────────────────────────────────────────────────

fn status_for(error: &Error) -> StatusCode {
    match error {
        Error::SessionNotFound(_) => StatusCode::NOT_FOUND,
        Error::SessionBusy(_) => StatusCode::CONFLICT,
        Error::PromptBudgetExceeded { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        Error::MetadataUnavailable { .. } => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(status: StatusCode, message: &str) -> (StatusCode, Json<serde_json::Value>) {
    (
        status,
        Json(
            serde_json::to_value(ErrorResponse {
                error: message.to_string(),
            })
            .unwrap_or_default(),
        ),
    )
}
