//! Walk-scoped cursor state. Every walk is keyed by a `WalkId` token so
//! concurrent walks never share a cursor.

use dashmap::DashMap;

use gugudan_core::ids::WalkId;
use gugudan_core::problem::{Problem, WalkStatus};

/// Default last multiplicand of a walk.
pub const UPPER_BOUND: u32 = 9;

struct WalkState {
    table: u32,
    cursor: u32,
    finished: bool,
}

/// All live walks, keyed by walk token.
pub struct WalkBook {
    walks: DashMap<WalkId, WalkState>,
    upper_bound: u32,
}

impl WalkBook {
    pub fn new() -> Self {
        Self::with_upper_bound(UPPER_BOUND)
    }

    pub fn with_upper_bound(upper_bound: u32) -> Self {
        Self {
            walks: DashMap::new(),
            upper_bound,
        }
    }

    /// Start (or restart) the walk registered under `walk_id` at
    /// cursor 1. Re-initializing an existing token resets its cursor.
    pub fn initialize(&self, walk_id: WalkId, table: u32) -> Problem {
        let finished = 1 >= self.upper_bound;
        let status = if finished {
            WalkStatus::Completed
        } else {
            WalkStatus::Continue
        };
        self.walks.insert(
            walk_id,
            WalkState {
                table,
                cursor: 1,
                finished,
            },
        );
        Problem::new(table, 1, status)
    }

    /// Advance the cursor by one. Returns `None` for an unknown or
    /// finished walk. The problem whose multiplicand reaches the upper
    /// bound carries `Completed` and closes the walk.
    pub fn next(&self, walk_id: &WalkId) -> Option<Problem> {
        let mut state = self.walks.get_mut(walk_id)?;
        if state.finished {
            return None;
        }
        state.cursor += 1;
        let status = if state.cursor >= self.upper_bound {
            state.finished = true;
            WalkStatus::Completed
        } else {
            WalkStatus::Continue
        };
        Some(Problem::new(state.table, state.cursor, status))
    }

    /// Close a walk. Idempotent; unknown tokens are a no-op.
    pub fn end(&self, walk_id: &WalkId) {
        if let Some(mut state) = self.walks.get_mut(walk_id) {
            state.finished = true;
        }
    }

    pub fn active(&self) -> usize {
        self.walks.iter().filter(|e| !e.finished).count()
    }
}

impl Default for WalkBook {
    fn default() -> Self {
        Self::new()
    }
}
