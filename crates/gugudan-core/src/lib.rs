//! Shared types for the gugudan agent system: branded IDs, the
//! problem/answer data model, channel envelopes, and the step error
//! taxonomy.

pub mod envelope;
pub mod errors;
pub mod ids;
pub mod problem;
