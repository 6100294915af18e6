//! Error types for role agent invocations.

use std::time::Duration;

/// Errors produced while invoking a single role agent.
///
/// These are always scoped to one role; the orchestrator turns them into a
/// failed section and moves on.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("completion endpoint rejected the credential (status {status})")]
    Auth { status: u16 },

    #[error("rate limit or quota exceeded")]
    RateLimited,

    #[error("completion endpoint returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("completion contained no text")]
    EmptyCompletion,

    #[error("image {name} unreadable: {source}")]
    Image {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("malformed completion payload: {0}")]
    Decode(#[from] serde_json::Error),
}

impl From<reqwest::Error> for AgentError {
    fn from(err: reqwest::Error) -> Self {
        AgentError::Http(err.to_string())
    }
}

/// Result type for agent operations.
pub type AgentResult<T> = std::result::Result<T, AgentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_error_display() {
        let err = AgentError::Api {
            status: 500,
            message: "backend unavailable".to_string(),
        };
        assert!(err.to_string().contains("500"));
        assert!(err.to_string().contains("backend unavailable"));

        let err = AgentError::Timeout(Duration::from_secs(3));
        assert!(err.to_string().contains("timed out"));
    }
}
