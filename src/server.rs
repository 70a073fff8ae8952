//! HTTP JSON API.
//!
//! Exposes the assistant pipeline to the web frontend: client management,
//! document ingestion, retrieval-only queries, and full chat turns.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/agents/list` | List personas |
//! | `GET`  | `/clients` | List clients |
//! | `POST` | `/clients` | Create a client |
//! | `POST` | `/documents` | Ingest a document |
//! | `POST` | `/query` | Retrieval only: ranked sources + context |
//! | `POST` | `/chat` | Full chat turn |
//!
//! # Error Contract
//!
//! All error responses share one schema:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "message must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `llm_error` (502),
//! `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support the browser
//! frontend.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

use crate::agents;
use crate::chat::{self, ChatReply};
use crate::config::Config;
use crate::db;
use crate::embedding;
use crate::ingest;
use crate::llm::ChatMessage;
use crate::models::{Client, DocumentScope, RagContext};
use crate::retrieval;
use crate::store::{DocumentStore, SqliteStore};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    store: Arc<SqliteStore>,
}

/// Starts the HTTP server.
///
/// Binds to the address configured in `[server].bind` and runs until the
/// process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let pool = db::connect(config).await?;

    let state = AppState {
        config: Arc::new(config.clone()),
        store: Arc::new(SqliteStore::new(pool)),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(handle_health))
        .route("/agents/list", get(handle_list_agents))
        .route("/clients", get(handle_list_clients).post(handle_create_client))
        .route("/documents", post(handle_ingest_document))
        .route("/query", post(handle_query))
        .route("/chat", post(handle_chat))
        .layer(cors)
        .with_state(state);

    tracing::info!("server listening on http://{}", bind_addr);
    println!("PiriChat server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`).
    code: String,
    /// Human-readable error message.
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn llm_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_GATEWAY,
        code: "llm_error".to_string(),
        message: message.into(),
    }
}

fn internal_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

/// Map pipeline errors onto the HTTP error contract: validation messages
/// become 400s, unknown entities 404s, everything else 500.
fn classify_error(err: anyhow::Error) -> AppError {
    let msg = format!("{:#}", err);

    if msg.contains("unknown client") || msg.contains("not found") {
        not_found(msg)
    } else if msg.contains("must not be empty") || msg.contains("Unknown agent") {
        bad_request(msg)
    } else {
        internal_error(msg)
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /agents/list ============

#[derive(Serialize)]
struct AgentListResponse {
    agents: Vec<&'static agents::AgentPersona>,
    default_agent: &'static str,
}

async fn handle_list_agents(State(state): State<AppState>) -> Json<AgentListResponse> {
    let default = agents::default_persona(state.config.router.default_agent.as_deref());
    Json(AgentListResponse {
        agents: agents::personas().iter().collect(),
        default_agent: default.name,
    })
}

// ============ /clients ============

#[derive(Serialize)]
struct ClientListResponse {
    clients: Vec<Client>,
}

async fn handle_list_clients(
    State(state): State<AppState>,
) -> Result<Json<ClientListResponse>, AppError> {
    let clients = state
        .store
        .list_clients()
        .await
        .map_err(classify_error)?;
    Ok(Json(ClientListResponse { clients }))
}

#[derive(Deserialize)]
struct CreateClientRequest {
    name: String,
}

async fn handle_create_client(
    State(state): State<AppState>,
    Json(req): Json<CreateClientRequest>,
) -> Result<Json<Client>, AppError> {
    if req.name.trim().is_empty() {
        return Err(bad_request("name must not be empty"));
    }

    let client = Client {
        id: Uuid::new_v4().to_string(),
        name: req.name.trim().to_string(),
        created_at: chrono::Utc::now().timestamp(),
    };

    state
        .store
        .upsert_client(&client)
        .await
        .map_err(classify_error)?;

    Ok(Json(client))
}

// ============ POST /documents ============

#[derive(Deserialize)]
struct IngestRequest {
    /// `"kb"` or `"client"`.
    scope: String,
    client_id: Option<String>,
    name: String,
    text: String,
}

#[derive(Serialize)]
struct IngestResponse {
    document_id: String,
    chunks_written: usize,
    embedded: usize,
    pending: usize,
}

async fn handle_ingest_document(
    State(state): State<AppState>,
    Json(req): Json<IngestRequest>,
) -> Result<Json<IngestResponse>, AppError> {
    let scope = match req.scope.as_str() {
        "kb" => DocumentScope::KnowledgeBase,
        "client" => match req.client_id {
            Some(id) => DocumentScope::Client(id),
            None => return Err(bad_request("client_id is required when scope is 'client'")),
        },
        other => {
            return Err(bad_request(format!(
                "unknown scope: '{}'. Use kb or client.",
                other
            )))
        }
    };

    let provider = embedding::create_provider(&state.config.embedding).map_err(classify_error)?;

    let stats = ingest::ingest_document(
        state.store.as_ref(),
        provider.as_ref(),
        &state.config,
        scope,
        &req.name,
        &req.text,
    )
    .await
    .map_err(classify_error)?;

    Ok(Json(IngestResponse {
        document_id: stats.document_id,
        chunks_written: stats.chunks_written,
        embedded: stats.embedded,
        pending: stats.pending,
    }))
}

// ============ POST /query ============

#[derive(Deserialize)]
struct QueryRequest {
    query: String,
    client_id: Option<String>,
}

async fn handle_query(
    State(state): State<AppState>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<RagContext>, AppError> {
    if req.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }

    if let Some(ref id) = req.client_id {
        let known = state.store.get_client(id).await.map_err(classify_error)?;
        if known.is_none() {
            return Err(not_found(format!("unknown client: {}", id)));
        }
    }

    let provider = embedding::create_provider(&state.config.embedding).map_err(classify_error)?;

    let context = retrieval::search_full_context(
        state.store.as_ref(),
        provider.as_ref(),
        &state.config,
        &req.query,
        req.client_id.as_deref(),
    )
    .await
    .map_err(classify_error)?;

    Ok(Json(context))
}

// ============ POST /chat ============

#[derive(Deserialize)]
struct ChatRequest {
    message: String,
    client_id: Option<String>,
    /// Persona name, `"auto"`, or absent (routed).
    agent: Option<String>,
    #[serde(default)]
    history: Vec<ChatMessage>,
}

async fn handle_chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatReply>, AppError> {
    if req.message.trim().is_empty() {
        return Err(bad_request("message must not be empty"));
    }

    let reply = chat::run_chat_turn(
        state.store.as_ref(),
        &state.config,
        &req.message,
        req.client_id.as_deref(),
        req.agent.as_deref(),
        &req.history,
    )
    .await
    .map_err(|e| {
        let msg = format!("{:#}", e);
        if msg.contains("unknown client") {
            not_found(msg)
        } else if msg.contains("Unknown agent") {
            bad_request(msg)
        } else {
            // Past validation, failures are provider failures.
            llm_error(msg)
        }
    })?;

    Ok(Json(reply))
}
