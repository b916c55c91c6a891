//! Problem generator agent: owns walk cursors and serves the
//! initialize/next/end surface the supervisor steps through.

pub mod server;
pub mod walks;

pub use server::{build_router, start, GeneratorConfig, ServerHandle};
pub use walks::WalkBook;
