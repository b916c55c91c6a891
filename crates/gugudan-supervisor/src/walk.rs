//! The orchestration task: one full table-walk from initialization to
//! termination, plus the supervisor that tracks every spawned walk.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

use gugudan_core::envelope::{Sender, ServerEnvelope};
use gugudan_core::errors::StepError;
use gugudan_core::ids::WalkId;
use gugudan_core::problem::TableWalkRequest;

use crate::registry::ClientRegistry;
use crate::steps::StepService;

/// Drives a single walk. Every state transition is broadcast in strict
/// order: problem → answer → (explanation) → next-problem-or-termination.
pub struct WalkRunner {
    steps: Arc<dyn StepService>,
    registry: Arc<ClientRegistry>,
    request: TableWalkRequest,
    pace: Duration,
}

impl WalkRunner {
    pub fn new(
        steps: Arc<dyn StepService>,
        registry: Arc<ClientRegistry>,
        request: TableWalkRequest,
        pace: Duration,
    ) -> Self {
        Self {
            steps,
            registry,
            request,
            pace,
        }
    }

    /// Run the walk to natural termination. A `StepError` bubbles to the
    /// spawn boundary, which turns it into one final system_message.
    pub async fn run(&self, walk_id: &WalkId, cancel: &CancellationToken) -> Result<(), StepError> {
        let table = self.request.table;

        let mut current = self
            .steps
            .initialize(walk_id, table, self.request.stop_value)
            .await?;
        self.registry.broadcast(&ServerEnvelope::problem(&current.problem));

        loop {
            if cancel.is_cancelled() {
                tracing::info!(walk_id = %walk_id, "walk cancelled");
                return Ok(());
            }

            let answer = self.steps.solve(&current.problem).await?;
            self.registry.broadcast(&ServerEnvelope::answer(&answer.calculation));
            if let Some(explanation) = &answer.explanation {
                self.registry.broadcast(&ServerEnvelope::explanation(explanation));
            }

            if let Some(stop) = self.request.stop_value {
                if answer.answer >= stop {
                    self.broadcast_termination(format!(
                        "정답이 {stop}에 도달했습니다. 구구단이 끝났습니다."
                    ));
                    // The walk is already over for the clients; a failed
                    // cleanup call must not produce a second broadcast.
                    if let Err(e) = self.steps.end(walk_id).await {
                        tracing::warn!(walk_id = %walk_id, error = %e, "end() failed after threshold stop");
                    }
                    return Ok(());
                }
            }

            match self.steps.next(walk_id).await? {
                None => {
                    self.broadcast_termination(format!(
                        "구구단이 끝났습니다. {table}단 학습 완료!"
                    ));
                    return Ok(());
                }
                Some(problem) if problem.is_completed() => {
                    self.broadcast_termination(format!(
                        "구구단이 끝났습니다. {table}단 학습 완료!"
                    ));
                    return Ok(());
                }
                Some(problem) => {
                    self.registry.broadcast(&ServerEnvelope::problem(&problem.problem));
                    current = problem;
                }
            }

            // Bound the call rate against the collaborators.
            tokio::select! {
                _ = tokio::time::sleep(self.pace) => {}
                _ = cancel.cancelled() => {
                    tracing::info!(walk_id = %walk_id, "walk cancelled");
                    return Ok(());
                }
            }
        }
    }

    fn broadcast_termination(&self, content: String) {
        self.registry
            .broadcast(&ServerEnvelope::system(content, Sender::Supervisor));
    }
}

/// Tracks every in-flight walk so process shutdown can be graceful
/// instead of abrupt. Spawned walks remove themselves on completion.
pub struct WalkSupervisor {
    steps: Arc<dyn StepService>,
    registry: Arc<ClientRegistry>,
    pace: Duration,
    active: DashMap<WalkId, CancellationToken>,
}

impl WalkSupervisor {
    pub fn new(steps: Arc<dyn StepService>, registry: Arc<ClientRegistry>, pace: Duration) -> Self {
        Self {
            steps,
            registry,
            pace,
            active: DashMap::new(),
        }
    }

    /// Start one walk, fire-and-forget. The task boundary catches every
    /// failure: it is reported as one system_message broadcast and
    /// never reaches the hosting process or other walks.
    pub fn spawn(self: &Arc<Self>, request: TableWalkRequest) -> WalkId {
        let walk_id = WalkId::new();
        let cancel = CancellationToken::new();
        self.active.insert(walk_id.clone(), cancel.clone());

        let supervisor = Arc::clone(self);
        let task_walk_id = walk_id.clone();
        tokio::spawn(async move {
            let runner = WalkRunner::new(
                Arc::clone(&supervisor.steps),
                Arc::clone(&supervisor.registry),
                request,
                supervisor.pace,
            );
            if let Err(e) = runner.run(&task_walk_id, &cancel).await {
                tracing::warn!(walk_id = %task_walk_id, kind = e.kind(), error = %e, "walk failed");
                supervisor.registry.broadcast(&ServerEnvelope::system(
                    format!("구구단 처리 중 오류 발생: {e}"),
                    Sender::Supervisor,
                ));
            }
            supervisor.active.remove(&task_walk_id);
        });

        walk_id
    }

    /// Cancel one walk. Returns whether it was active.
    pub fn abort(&self, walk_id: &WalkId) -> bool {
        if let Some((_, cancel)) = self.active.remove(walk_id) {
            cancel.cancel();
            true
        } else {
            false
        }
    }

    /// Cancel every active walk; used at shutdown.
    pub fn abort_all(&self) -> usize {
        let count = self.active.len();
        for entry in self.active.iter() {
            entry.value().cancel();
        }
        self.active.clear();
        count
    }

    /// Number of in-flight walks.
    pub fn active(&self) -> usize {
        self.active.len()
    }
}
