//! Typed wrappers for the remote calls the orchestration loop makes to
//! the generator and solver agents. Each call either returns data or a
//! `StepError`; nothing here touches the walk's local state.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;

use gugudan_core::errors::StepError;
use gugudan_core::ids::WalkId;
use gugudan_core::problem::{
    Answer, EndAck, InitializeRequest, InitializedWalk, Problem, SolveRequest, WalkRef,
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// The four steps a walk makes against its collaborators.
#[async_trait]
pub trait StepService: Send + Sync {
    async fn initialize(
        &self,
        walk_id: &WalkId,
        table: u32,
        stop_value: Option<i64>,
    ) -> Result<Problem, StepError>;

    async fn solve(&self, problem: &str) -> Result<Answer, StepError>;

    /// `Ok(None)` when the walk is already finished on the generator
    /// side.
    async fn next(&self, walk_id: &WalkId) -> Result<Option<Problem>, StepError>;

    /// Idempotent on the generator side.
    async fn end(&self, walk_id: &WalkId) -> Result<(), StepError>;
}

/// Production step client speaking HTTP/JSON to the two agents.
pub struct HttpStepClient {
    client: Client,
    generator_url: String,
    solver_url: String,
}

impl HttpStepClient {
    pub fn new(
        generator_url: impl Into<String>,
        solver_url: impl Into<String>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            client: Client::builder()
                .connect_timeout(CONNECT_TIMEOUT)
                .timeout(request_timeout)
                .build()
                .expect("failed to build HTTP client"),
            generator_url: generator_url.into(),
            solver_url: solver_url.into(),
        }
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        url: String,
        body: &B,
    ) -> Result<T, StepError> {
        let resp = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| StepError::unavailable(endpoint, e))?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            return Err(StepError::rejected(endpoint, status.as_u16(), detail));
        }

        resp.json::<T>()
            .await
            .map_err(|e| StepError::invalid_body(endpoint, e))
    }
}

#[async_trait]
impl StepService for HttpStepClient {
    async fn initialize(
        &self,
        walk_id: &WalkId,
        table: u32,
        stop_value: Option<i64>,
    ) -> Result<Problem, StepError> {
        let walk: InitializedWalk = self
            .post_json(
                "generator",
                format!("{}/problem/initialize", self.generator_url),
                &InitializeRequest {
                    walk_id: walk_id.clone(),
                    table,
                    stop_value,
                },
            )
            .await?;
        Ok(walk.problem)
    }

    async fn solve(&self, problem: &str) -> Result<Answer, StepError> {
        self.post_json(
            "solver",
            format!("{}/answer", self.solver_url),
            &SolveRequest {
                problem: problem.to_string(),
            },
        )
        .await
    }

    async fn next(&self, walk_id: &WalkId) -> Result<Option<Problem>, StepError> {
        self.post_json(
            "generator",
            format!("{}/problem/next", self.generator_url),
            &WalkRef {
                walk_id: walk_id.clone(),
            },
        )
        .await
    }

    async fn end(&self, walk_id: &WalkId) -> Result<(), StepError> {
        let _: EndAck = self
            .post_json(
                "generator",
                format!("{}/problem/end", self.generator_url),
                &WalkRef {
                    walk_id: walk_id.clone(),
                },
            )
            .await?;
        Ok(())
    }
}
