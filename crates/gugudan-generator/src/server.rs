//! Axum surface for the problem generator agent.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;

use gugudan_core::problem::{EndAck, InitializeRequest, InitializedWalk, Problem, WalkRef};

use crate::walks::WalkBook;

/// Server configuration.
pub struct GeneratorConfig {
    pub port: u16,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self { port: 5000 }
    }
}

impl GeneratorConfig {
    /// Read the port from `GENERATOR_PORT` (or the legacy `AGENT1_PORT`).
    pub fn from_env() -> Self {
        let port = std::env::var("GENERATOR_PORT")
            .or_else(|_| std::env::var("AGENT1_PORT"))
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or_else(|| Self::default().port);
        Self { port }
    }
}

/// Build the Axum router with all routes.
pub fn build_router(book: Arc<WalkBook>) -> Router {
    Router::new()
        .route("/problem/initialize", post(initialize_handler))
        .route("/problem/next", post(next_handler))
        .route("/problem/end", post(end_handler))
        .route("/health", get(health_handler))
        .with_state(book)
        .layer(CorsLayer::permissive())
}

/// Create and start the server. Returns a handle that keeps it alive.
pub async fn start(config: GeneratorConfig) -> Result<ServerHandle, std::io::Error> {
    let book = Arc::new(WalkBook::new());
    let router = build_router(Arc::clone(&book));

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(port = local_addr.port(), "problem generator started");

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });

    Ok(ServerHandle {
        port: local_addr.port(),
        book,
        _server: server_handle,
    })
}

/// Handle returned by `start()` — keeps the serve task alive.
pub struct ServerHandle {
    pub port: u16,
    pub book: Arc<WalkBook>,
    _server: tokio::task::JoinHandle<()>,
}

async fn initialize_handler(
    State(book): State<Arc<WalkBook>>,
    Json(req): Json<InitializeRequest>,
) -> impl IntoResponse {
    if req.table < 1 {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({
                "detail": format!("구구단 단수는 1 이상이어야 합니다: {}", req.table)
            })),
        )
            .into_response();
    }
    let problem = book.initialize(req.walk_id.clone(), req.table);
    tracing::info!(walk_id = %req.walk_id, table = req.table, "walk initialized");
    Json(InitializedWalk {
        walk_id: req.walk_id,
        problem,
    })
    .into_response()
}

/// `200 null` when the walk is unknown or already finished, matching the
/// original generator's optional response body.
async fn next_handler(
    State(book): State<Arc<WalkBook>>,
    Json(walk): Json<WalkRef>,
) -> Json<Option<Problem>> {
    Json(book.next(&walk.walk_id))
}

async fn end_handler(
    State(book): State<Arc<WalkBook>>,
    Json(walk): Json<WalkRef>,
) -> Json<EndAck> {
    book.end(&walk.walk_id);
    tracing::info!(walk_id = %walk.walk_id, "walk ended");
    Json(EndAck {
        status: "ok".into(),
        message: "구구단 문제 생성이 종료되었습니다.".into(),
    })
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok", "agent": "problem_generator"}))
}
