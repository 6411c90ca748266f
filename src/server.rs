//! HTTP server: the three UI pages plus a small JSON API over the same
//! conversation session.
//!
//! The server owns exactly one [`ChatSession`] behind a `tokio::sync::Mutex`,
//! so turns are processed one at a time. The session initializes lazily on
//! the first request that needs the agent.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Home page |
//! | `GET`  | `/user?time=…` | Score history chart and per-timestamp details |
//! | `GET`  | `/chat` | Chat page (initializes the session) |
//! | `POST` | `/chat` | Send a message (form field `message`) |
//! | `POST` | `/chat/clear` | Clear the conversation history |
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/api/messages` | Transcript as `{"messages": [...]}` |
//! | `POST` | `/api/chat` | `{"message": "..."}` → `{"response": "...", "messages": n}` |
//! | `POST` | `/api/clear` | Clear the conversation history |
//! | `GET`  | `/api/scores` | All score entries |
//! | `GET`  | `/api/scores/{time}` | The entry recorded at `YYYY-MM-DD HH:MM:SS` |
//!
//! # Error Contract
//!
//! JSON endpoints report errors as:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "message must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `agent_error` (500),
//! `internal` (500). The HTML pages show the error text inline instead.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::embedding::{EmbeddingProvider, OpenAIProvider};
use crate::engine::ChatSession;
use crate::llm::{ChatModel, OpenAIChatModel};
use crate::models::ScoreEntry;
use crate::pages;
use crate::scores;

/// Notice shown after the history was cleared.
const CLEARED_NOTICE: &str = "Đã xóa lịch sử hội thoại!";

#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    session: Arc<Mutex<ChatSession>>,
}

/// Start the server with the OpenAI-backed chat model and embedder.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let chat: Arc<dyn ChatModel> = Arc::new(OpenAIChatModel::new(&config.llm)?);
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(OpenAIProvider::new(&config.embedding)?);
    run_server_with_backends(config, chat, embedder).await
}

/// Start the server with caller-supplied model backends.
pub async fn run_server_with_backends(
    config: &Config,
    chat: Arc<dyn ChatModel>,
    embedder: Arc<dyn EmbeddingProvider>,
) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let config = Arc::new(config.clone());
    let session = ChatSession::new(config.clone(), chat, embedder);

    let state = AppState {
        config,
        session: Arc::new(Mutex::new(session)),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/", get(handle_home))
        .route("/user", get(handle_user))
        .route("/chat", get(handle_chat_page).post(handle_chat_submit))
        .route("/chat/clear", post(handle_chat_clear))
        .route("/health", get(handle_health))
        .route("/api/messages", get(handle_api_messages))
        .route("/api/chat", post(handle_api_chat))
        .route("/api/clear", post(handle_api_clear))
        .route("/api/scores", get(handle_api_scores))
        .route("/api/scores/{time}", get(handle_api_score_at))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    println!("MindCare server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

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

fn agent_error(err: anyhow::Error) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "agent_error".to_string(),
        message: format!("{:#}", err),
    }
}

fn internal(err: anyhow::Error) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: format!("{:#}", err),
    }
}

// ============ UI pages ============

async fn handle_home() -> Html<String> {
    Html(pages::home_page())
}

#[derive(Deserialize)]
struct UserQuery {
    time: Option<String>,
}

async fn handle_user(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Html<String> {
    let entries = scores::load_scores(&state.config.paths.scores_file);
    Html(pages::user_page(&entries, query.time.as_deref()))
}

#[derive(Deserialize)]
struct ChatPageQuery {
    cleared: Option<String>,
}

async fn handle_chat_page(
    State(state): State<AppState>,
    Query(query): Query<ChatPageQuery>,
) -> Html<String> {
    let mut session = state.session.lock().await;
    let error = session.initialize().await.err().map(|e| {
        tracing::error!(error = %e, "chat session failed to initialize");
        format!("{:#}", e)
    });
    let notice = query.cleared.is_some().then_some(CLEARED_NOTICE);
    Html(pages::chat_page(
        session.messages(),
        notice,
        error.as_deref(),
    ))
}

#[derive(Deserialize)]
struct ChatForm {
    message: String,
}

async fn handle_chat_submit(State(state): State<AppState>, Form(form): Form<ChatForm>) -> Response {
    if form.message.trim().is_empty() {
        return Redirect::to("/chat").into_response();
    }

    let mut session = state.session.lock().await;
    match session.run_turn(&form.message).await {
        Ok(_) => Redirect::to("/chat").into_response(),
        Err(e) => {
            tracing::error!(error = %e, "chat turn failed");
            Html(pages::chat_page(
                session.messages(),
                None,
                Some(&format!("{:#}", e)),
            ))
            .into_response()
        }
    }
}

async fn handle_chat_clear(State(state): State<AppState>) -> Response {
    let mut session = state.session.lock().await;
    match session.clear() {
        Ok(()) => Redirect::to("/chat?cleared=1").into_response(),
        Err(e) => Html(pages::chat_page(
            session.messages(),
            None,
            Some(&format!("Lỗi khi xóa file: {:#}", e)),
        ))
        .into_response(),
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

// ============ JSON API ============

async fn handle_api_messages(State(state): State<AppState>) -> Json<serde_json::Value> {
    let session = state.session.lock().await;
    Json(session.transcript().export())
}

#[derive(Deserialize)]
struct ChatRequest {
    message: String,
}

#[derive(Serialize)]
struct ChatResponse {
    response: String,
    messages: usize,
}

async fn handle_api_chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    if req.message.trim().is_empty() {
        return Err(bad_request("message must not be empty"));
    }

    let mut session = state.session.lock().await;
    let response = session.run_turn(&req.message).await.map_err(|e| {
        tracing::error!(error = %e, "chat turn failed");
        agent_error(e)
    })?;

    Ok(Json(ChatResponse {
        response,
        messages: session.messages().len(),
    }))
}

async fn handle_api_clear(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let mut session = state.session.lock().await;
    session.clear().map_err(internal)?;
    Ok(Json(serde_json::json!({ "status": "cleared" })))
}

#[derive(Serialize)]
struct ScoresResponse {
    scores: Vec<ScoreEntry>,
}

async fn handle_api_scores(State(state): State<AppState>) -> Json<ScoresResponse> {
    Json(ScoresResponse {
        scores: scores::load_scores(&state.config.paths.scores_file),
    })
}

async fn handle_api_score_at(
    State(state): State<AppState>,
    Path(time): Path<String>,
) -> Result<Json<ScoreEntry>, AppError> {
    let entries = scores::load_scores(&state.config.paths.scores_file);
    scores::find_by_time(&entries, &time)
        .cloned()
        .map(Json)
        .ok_or_else(|| not_found(format!("no score recorded at {}", time)))
}
