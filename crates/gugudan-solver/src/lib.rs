//! Answer provider agent: computes times-table answers and enriches
//! them with a best-effort explanation.

pub mod explain;
pub mod server;
pub mod solve;

pub use explain::{Explainer, TemplateExplainer, EXPLANATION_PLACEHOLDER};
pub use server::{build_router, start, ServerHandle, SolverConfig};
pub use solve::{solve, SolveError, Solved};
