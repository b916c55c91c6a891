//! Axum surface for the supervisor: a command endpoint, the WebSocket
//! channel, and the inbound-message processor that feeds both into the
//! walk supervisor.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;

use gugudan_core::envelope::{ClientEnvelope, Sender, ServerEnvelope};
use gugudan_core::ids::ClientId;

use crate::parser;
use crate::registry::{handle_ws_connection, ClientRegistry};
use crate::steps::{HttpStepClient, StepService};
use crate::walk::WalkSupervisor;

const INBOUND_QUEUE: usize = 256;

const GUIDANCE: &str = "구구단 단수를 인식할 수 없습니다. 예: '5단 구구단 시작해줘'";
const MALFORMED: &str = "잘못된 형식의 메시지입니다.";

/// Server configuration.
pub struct SupervisorConfig {
    pub port: u16,
    pub generator_url: String,
    pub solver_url: String,
    pub max_send_queue: usize,
    pub request_timeout: Duration,
    pub pace: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            generator_url: "http://localhost:5000".into(),
            solver_url: "http://localhost:6001".into(),
            max_send_queue: 256,
            request_timeout: Duration::from_secs(10),
            pace: Duration::from_secs(1),
        }
    }
}

impl SupervisorConfig {
    /// Read overrides from `SUPERVISOR_PORT`, `GENERATOR_URL` and
    /// `SOLVER_URL`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(port) = std::env::var("SUPERVISOR_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
        {
            config.port = port;
        }
        if let Ok(url) = std::env::var("GENERATOR_URL") {
            config.generator_url = url;
        }
        if let Ok(url) = std::env::var("SOLVER_URL") {
            config.solver_url = url;
        }
        config
    }
}

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ClientRegistry>,
    pub supervisor: Arc<WalkSupervisor>,
    inbound_tx: mpsc::Sender<(ClientId, String)>,
}

impl AppState {
    pub fn new(steps: Arc<dyn StepService>, max_send_queue: usize, pace: Duration) -> Self {
        let registry = Arc::new(ClientRegistry::new(max_send_queue));
        let supervisor = Arc::new(WalkSupervisor::new(steps, Arc::clone(&registry), pace));
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_QUEUE);

        let state = Self {
            registry,
            supervisor,
            inbound_tx,
        };
        tokio::spawn(process_messages(state.clone(), inbound_rx));
        state
    }
}

#[derive(Debug, Deserialize)]
pub struct SupervisorRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct SupervisorResponse {
    pub message: String,
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/request", post(request_handler))
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// Create and start the server. Returns a handle that keeps it alive.
pub async fn start(config: SupervisorConfig) -> Result<ServerHandle, std::io::Error> {
    let steps = Arc::new(HttpStepClient::new(
        config.generator_url.clone(),
        config.solver_url.clone(),
        config.request_timeout,
    ));
    let state = AppState::new(steps, config.max_send_queue, config.pace);
    let registry = Arc::clone(&state.registry);
    let supervisor = Arc::clone(&state.supervisor);
    let router = build_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(
        port = local_addr.port(),
        generator = %config.generator_url,
        solver = %config.solver_url,
        "supervisor started"
    );

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });

    Ok(ServerHandle {
        port: local_addr.port(),
        registry,
        supervisor,
        _server: server_handle,
    })
}

/// Handle returned by `start()` — keeps the serve task alive.
pub struct ServerHandle {
    pub port: u16,
    pub registry: Arc<ClientRegistry>,
    pub supervisor: Arc<WalkSupervisor>,
    _server: tokio::task::JoinHandle<()>,
}

/// Parse free text and, if it names a table, acknowledge and start a
/// walk. The acknowledgement is broadcast before the walk is spawned so
/// it always precedes the walk's own events.
fn accept_command(state: &AppState, text: &str) -> (String, bool) {
    let Some(request) = parser::parse(text).into_request() else {
        tracing::info!(text, "unparsable command");
        return (GUIDANCE.to_string(), false);
    };

    let ack = match request.stop_value {
        Some(stop) => format!(
            "{table}단 구구단을 시작합니다. 정답이 {stop}에 도달하면 멈추겠습니다.",
            table = request.table
        ),
        None => format!(
            "{table}단 구구단을 시작합니다. {table}×9까지 진행하겠습니다.",
            table = request.table
        ),
    };
    state
        .registry
        .broadcast(&ServerEnvelope::system(ack.clone(), Sender::Supervisor));

    let walk_id = state.supervisor.spawn(request);
    tracing::info!(walk_id = %walk_id, "walk started");
    (ack, true)
}

/// Drain inbound WebSocket text. Malformed frames get a unicast notice;
/// recognized commands are acknowledged to everyone.
async fn process_messages(state: AppState, mut rx: mpsc::Receiver<(ClientId, String)>) {
    while let Some((client_id, raw)) = rx.recv().await {
        let content = match serde_json::from_str::<ClientEnvelope>(&raw) {
            Ok(ClientEnvelope::UserMessage { content }) => content,
            Err(e) => {
                tracing::info!(client_id = %client_id, error = %e, "malformed client message");
                state
                    .registry
                    .send_to(&client_id, &ServerEnvelope::system(MALFORMED, Sender::System));
                continue;
            }
        };

        let (reply, started) = accept_command(&state, &content);
        if !started {
            state
                .registry
                .send_to(&client_id, &ServerEnvelope::system(reply, Sender::Supervisor));
        }
    }
}

async fn request_handler(
    State(state): State<AppState>,
    Json(req): Json<SupervisorRequest>,
) -> Json<SupervisorResponse> {
    let (reply, _started) = accept_command(&state, &req.message);
    Json(SupervisorResponse { message: reply })
}

async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    let (client_id, rx) = state.registry.register();
    tracing::info!(client_id = %client_id, "WebSocket client connected");
    let registry = Arc::clone(&state.registry);
    let inbound_tx = state.inbound_tx.clone();
    ws.on_upgrade(move |socket| handle_ws_connection(socket, client_id, rx, registry, inbound_tx))
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok", "agent": "supervisor"}))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;

    use crate::walk::tests::{FailStep, FakeSteps};

    fn state_with(steps: FakeSteps) -> AppState {
        AppState::new(Arc::new(steps), 256, Duration::ZERO)
    }

    fn post_request(message: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/request")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                serde_json::json!({"message": message}).to_string(),
            ))
            .unwrap()
    }

    async fn body_json(resp: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), 64 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn wait_idle(state: &AppState) {
        for _ in 0..100 {
            if state.supervisor.active() == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("walk never finished");
    }

    fn drain(rx: &mut mpsc::Receiver<String>) -> Vec<(String, String)> {
        let mut events = Vec::new();
        while let Ok(raw) = rx.try_recv() {
            let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
            events.push((
                json["type"].as_str().unwrap().to_string(),
                json["content"].as_str().unwrap().to_string(),
            ));
        }
        events
    }

    #[tokio::test]
    async fn health_reports_agent_name() {
        let app = build_router(state_with(FakeSteps::new(9)));
        let resp = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["agent"], "supervisor");
    }

    #[tokio::test]
    async fn unparsable_request_gets_guidance_and_no_walk() {
        let state = state_with(FakeSteps::new(9));
        let resp = build_router(state.clone())
            .oneshot(post_request("안녕하세요"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert!(json["message"].as_str().unwrap().contains("인식할 수 없습니다"));
        assert_eq!(state.supervisor.active(), 0);
    }

    #[tokio::test]
    async fn request_starts_walk_and_broadcasts_progress() {
        let state = state_with(FakeSteps::new(3));
        let mut rx = state.registry.register().1;

        let resp = build_router(state.clone())
            .oneshot(post_request("4단 구구단 시작해줘"))
            .await
            .unwrap();
        let json = body_json(resp).await;
        assert!(json["message"]
            .as_str()
            .unwrap()
            .contains("4단 구구단을 시작합니다"));

        wait_idle(&state).await;
        let events = drain(&mut rx);
        assert!(events.iter().any(|(t, c)| t == "problem" && c == "4×1="));
        assert!(events.iter().any(|(t, c)| t == "answer" && c == "4×1=4"));
        assert!(events
            .iter()
            .any(|(t, c)| t == "system_message" && c.contains("학습 완료")));
    }

    #[tokio::test]
    async fn stop_threshold_is_passed_through() {
        let state = state_with(FakeSteps::new(9));
        let mut rx = state.registry.register().1;

        let resp = build_router(state.clone())
            .oneshot(post_request("3단 구구단, 정답이 6에 도달하면 멈춰줘"))
            .await
            .unwrap();
        let json = body_json(resp).await;
        assert!(json["message"].as_str().unwrap().contains("6에 도달하면"));

        wait_idle(&state).await;
        let events = drain(&mut rx);
        assert!(events
            .iter()
            .any(|(t, c)| t == "system_message" && c.contains("6에 도달했습니다")));
        // 3×1=3, 3×2=6 — two answers, then the stop.
        assert_eq!(events.iter().filter(|(t, _)| t == "answer").count(), 2);
    }

    #[tokio::test]
    async fn collaborator_failure_reaches_clients_as_system_message() {
        let state = state_with(FakeSteps::new(9).failing_at(FailStep::Initialize));
        let mut rx = state.registry.register().1;

        build_router(state.clone())
            .oneshot(post_request("5단 시작"))
            .await
            .unwrap();

        wait_idle(&state).await;
        let events = drain(&mut rx);
        // The start acknowledgement, then the failure notice.
        let systems: Vec<_> = events.iter().filter(|(t, _)| t == "system_message").collect();
        assert_eq!(systems.len(), 2);
        assert!(systems[1].1.contains("오류"));
    }

    #[tokio::test]
    async fn malformed_ws_payload_gets_unicast_notice() {
        let state = state_with(FakeSteps::new(9));
        let (client_id, mut rx) = state.registry.register();
        let (_other_id, mut other_rx) = state.registry.register();

        state
            .inbound_tx
            .send((client_id, "not json at all".into()))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, "system_message");
        assert!(events[0].1.contains("잘못된 형식"));
        assert!(drain(&mut other_rx).is_empty());
    }

    #[tokio::test]
    async fn unknown_envelope_tag_is_treated_as_malformed() {
        let state = state_with(FakeSteps::new(9));
        let (client_id, mut rx) = state.registry.register();

        state
            .inbound_tx
            .send((
                client_id,
                serde_json::json!({"type": "status_update", "content": "x"}).to_string(),
            ))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert!(events[0].1.contains("잘못된 형식"));
    }

    #[tokio::test]
    async fn ws_user_message_starts_walk_and_acks_everyone() {
        let state = state_with(FakeSteps::new(2));
        let (client_id, mut rx) = state.registry.register();
        let (_other_id, mut other_rx) = state.registry.register();

        state
            .inbound_tx
            .send((
                client_id,
                serde_json::json!({"type": "user_message", "content": "7단 구구단 시작해줘"})
                    .to_string(),
            ))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        wait_idle(&state).await;

        for events in [drain(&mut rx), drain(&mut other_rx)] {
            assert!(events
                .iter()
                .any(|(t, c)| t == "system_message" && c.contains("7단 구구단을 시작합니다")));
            assert!(events.iter().any(|(t, c)| t == "problem" && c == "7×1="));
        }
    }

    #[tokio::test]
    async fn ws_unparsable_command_is_unicast_guidance() {
        let state = state_with(FakeSteps::new(9));
        let (client_id, mut rx) = state.registry.register();
        let (_other_id, mut other_rx) = state.registry.register();

        state
            .inbound_tx
            .send((
                client_id,
                serde_json::json!({"type": "user_message", "content": "구구단 해줘"}).to_string(),
            ))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let events = drain(&mut rx);
        assert!(events
            .iter()
            .any(|(_, c)| c.contains("인식할 수 없습니다")));
        assert!(drain(&mut other_rx).is_empty());
        assert_eq!(state.supervisor.active(), 0);
    }
}
