/// Typed failures for the supervisor's remote step calls. Every step
/// call either returns data or exactly one of these — the orchestration
/// task decides what to do with each outcome.
#[derive(Clone, Debug, thiserror::Error)]
pub enum StepError {
    /// The collaborator could not be reached at all (connect failure,
    /// DNS, timeout).
    #[error("{endpoint} 에이전트에 연결할 수 없습니다: {detail}")]
    RemoteUnavailable { endpoint: String, detail: String },

    /// The collaborator answered with a non-success status. Includes the
    /// malformed-problem case, with the body detail preserved.
    #[error("{endpoint} 요청이 거부되었습니다 (status {status}): {detail}")]
    RemoteRejected {
        endpoint: String,
        status: u16,
        detail: String,
    },

    /// The collaborator returned 200 but the body did not decode.
    #[error("{endpoint} 응답을 해석할 수 없습니다: {detail}")]
    InvalidBody { endpoint: String, detail: String },
}

impl StepError {
    pub fn unavailable(endpoint: impl Into<String>, detail: impl ToString) -> Self {
        Self::RemoteUnavailable {
            endpoint: endpoint.into(),
            detail: detail.to_string(),
        }
    }

    pub fn rejected(endpoint: impl Into<String>, status: u16, detail: impl ToString) -> Self {
        Self::RemoteRejected {
            endpoint: endpoint.into(),
            status,
            detail: detail.to_string(),
        }
    }

    pub fn invalid_body(endpoint: impl Into<String>, detail: impl ToString) -> Self {
        Self::InvalidBody {
            endpoint: endpoint.into(),
            detail: detail.to_string(),
        }
    }

    /// Short classification string for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RemoteUnavailable { .. } => "remote_unavailable",
            Self::RemoteRejected { .. } => "remote_rejected",
            Self::InvalidBody { .. } => "invalid_body",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_strings() {
        assert_eq!(
            StepError::unavailable("generator", "connect refused").kind(),
            "remote_unavailable"
        );
        assert_eq!(
            StepError::rejected("solver", 400, "bad problem").kind(),
            "remote_rejected"
        );
        assert_eq!(
            StepError::invalid_body("generator", "not json").kind(),
            "invalid_body"
        );
    }

    #[test]
    fn rejected_preserves_detail() {
        let err = StepError::rejected("solver", 400, "올바르지 않은 문제 형식입니다: 7+8=");
        let msg = err.to_string();
        assert!(msg.contains("400"));
        assert!(msg.contains("7+8="));
    }

    #[test]
    fn display_names_endpoint() {
        let err = StepError::unavailable("generator", "timeout");
        assert!(err.to_string().contains("generator"));
    }
}
