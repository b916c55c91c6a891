//! Axum surface for the answer provider agent.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;

use gugudan_core::problem::{Answer, SolveRequest};

use crate::explain::{Explainer, TemplateExplainer, EXPLANATION_PLACEHOLDER};
use crate::solve::{solve, SolveError};

/// Server configuration.
pub struct SolverConfig {
    pub port: u16,
    /// Ceiling on explanation generation; the answer is never held up
    /// longer than this.
    pub explain_timeout: Duration,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            port: 6001,
            explain_timeout: Duration::from_secs(5),
        }
    }
}

impl SolverConfig {
    /// Read the port from `SOLVER_PORT` (or the legacy `AGENT2_PORT`).
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let port = std::env::var("SOLVER_PORT")
            .or_else(|_| std::env::var("AGENT2_PORT"))
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(defaults.port);
        Self { port, ..defaults }
    }
}

#[derive(Clone)]
struct AppState {
    explainer: Arc<dyn Explainer>,
    explain_timeout: Duration,
}

/// Build the Axum router with all routes.
pub fn build_router(explainer: Arc<dyn Explainer>, explain_timeout: Duration) -> Router {
    let state = AppState {
        explainer,
        explain_timeout,
    };
    Router::new()
        .route("/answer", post(answer_handler))
        .route("/health", get(health_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// Create and start the server. Returns a handle that keeps it alive.
pub async fn start(config: SolverConfig) -> Result<ServerHandle, std::io::Error> {
    let router = build_router(Arc::new(TemplateExplainer), config.explain_timeout);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(port = local_addr.port(), "answer provider started");

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });

    Ok(ServerHandle {
        port: local_addr.port(),
        _server: server_handle,
    })
}

/// Handle returned by `start()` — keeps the serve task alive.
pub struct ServerHandle {
    pub port: u16,
    _server: tokio::task::JoinHandle<()>,
}

async fn answer_handler(
    State(state): State<AppState>,
    Json(req): Json<SolveRequest>,
) -> impl IntoResponse {
    let solved = match solve(&req.problem) {
        Ok(s) => s,
        Err(err @ SolveError::Malformed(_)) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"detail": err.to_string()})),
            )
                .into_response();
        }
        Err(err @ SolveError::Overflow(_)) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"detail": err.to_string()})),
            )
                .into_response();
        }
    };

    // Enrichment only: a slow or failing explainer degrades to the
    // placeholder, never the answer itself.
    let explanation =
        match tokio::time::timeout(state.explain_timeout, state.explainer.explain(&solved)).await {
            Ok(Ok(text)) => text,
            Ok(Err(err)) => {
                tracing::warn!(problem = %req.problem, error = %err, "explainer failed");
                EXPLANATION_PLACEHOLDER.to_string()
            }
            Err(_) => {
                tracing::warn!(problem = %req.problem, "explainer timed out");
                EXPLANATION_PLACEHOLDER.to_string()
            }
        };

    Json(Answer {
        answer: solved.answer,
        calculation: solved.calculation,
        explanation: Some(explanation),
    })
    .into_response()
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok", "agent": "answer_provider"}))
}
