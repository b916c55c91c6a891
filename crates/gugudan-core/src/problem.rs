//! The times-table data model and the HTTP wire bodies exchanged
//! between the supervisor and its collaborator services.

use serde::{Deserialize, Serialize};

use crate::ids::WalkId;

/// Progress marker for a walk. `Completed` is attached to the problem
/// whose multiplicand reaches the walk's upper bound.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalkStatus {
    Continue,
    Completed,
}

/// One generated problem, e.g. `"3×4="`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
    pub problem: String,
    pub multiplier: u32,
    pub multiplicand: u32,
    pub status: WalkStatus,
}

impl Problem {
    pub fn new(multiplier: u32, multiplicand: u32, status: WalkStatus) -> Self {
        Self {
            problem: format!("{multiplier}×{multiplicand}="),
            multiplier,
            multiplicand,
            status,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == WalkStatus::Completed
    }
}

/// A solved problem with the full calculation string, e.g. `"3×4=12"`.
/// The explanation is best-effort and may carry a failure placeholder.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub answer: i64,
    pub calculation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// A parsed user command: which table to walk and an optional answer
/// threshold that stops the walk early. Immutable once handed to a task.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableWalkRequest {
    pub table: u32,
    pub stop_value: Option<i64>,
}

// ── HTTP wire bodies ──

/// `POST /problem/initialize` request. The caller mints the walk token;
/// it scopes every subsequent `next`/`end` call so concurrent walks
/// cannot disturb each other's cursor.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InitializeRequest {
    pub walk_id: WalkId,
    pub table: u32,
    pub stop_value: Option<i64>,
}

/// `POST /problem/initialize` response: the echoed walk token plus the
/// first problem.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InitializedWalk {
    pub walk_id: WalkId,
    #[serde(flatten)]
    pub problem: Problem,
}

/// `POST /problem/next` and `POST /problem/end` request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WalkRef {
    pub walk_id: WalkId,
}

/// `POST /answer` request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SolveRequest {
    pub problem: String,
}

/// `POST /problem/end` acknowledgement.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EndAck {
    pub status: String,
    pub message: String,
}
