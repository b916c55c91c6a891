//! Supervisor agent: parses free-text user requests, drives the
//! generator/solver exchange one walk at a time, and fans every state
//! transition out to all connected WebSocket clients.

pub mod parser;
pub mod registry;
pub mod server;
pub mod steps;
pub mod walk;

pub use parser::{parse, ParsedRequest};
pub use registry::ClientRegistry;
pub use server::{build_router, start, ServerHandle, SupervisorConfig};
pub use steps::{HttpStepClient, StepService};
pub use walk::{WalkRunner, WalkSupervisor};
