//! Tagged message envelopes exchanged over the supervisor's WebSocket
//! channel. Inbound and outbound directions are separate sum types so
//! unknown tags fail deserialization instead of being silently ignored.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Who produced an outbound envelope.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    System,
    Agent1,
    Agent2,
    Supervisor,
}

/// Messages a client may send to the supervisor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEnvelope {
    UserMessage { content: String },
}

/// Messages the supervisor pushes to connected clients. Ephemeral —
/// they exist only in flight and are never persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEnvelope {
    Problem {
        content: String,
        sender: Sender,
        timestamp: String,
    },
    Answer {
        content: String,
        sender: Sender,
        timestamp: String,
    },
    Explanation {
        content: String,
        sender: Sender,
        timestamp: String,
    },
    SystemMessage {
        content: String,
        sender: Sender,
        timestamp: String,
    },
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

impl ServerEnvelope {
    /// A generated problem, attributed to the generator agent.
    pub fn problem(content: impl Into<String>) -> Self {
        Self::Problem {
            content: content.into(),
            sender: Sender::Agent1,
            timestamp: now(),
        }
    }

    /// A solved calculation, attributed to the solver agent.
    pub fn answer(content: impl Into<String>) -> Self {
        Self::Answer {
            content: content.into(),
            sender: Sender::Agent2,
            timestamp: now(),
        }
    }

    /// A best-effort explanation, attributed to the solver agent.
    pub fn explanation(content: impl Into<String>) -> Self {
        Self::Explanation {
            content: content.into(),
            sender: Sender::Agent2,
            timestamp: now(),
        }
    }

    pub fn system(content: impl Into<String>, sender: Sender) -> Self {
        Self::SystemMessage {
            content: content.into(),
            sender,
            timestamp: now(),
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Self::Problem { content, .. }
            | Self::Answer { content, .. }
            | Self::Explanation { content, .. }
            | Self::SystemMessage { content, .. } => content,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Problem { .. } => "problem",
            Self::Answer { .. } => "answer",
            Self::Explanation { .. } => "explanation",
            Self::SystemMessage { .. } => "system_message",
        }
    }
}
