//! Error types for recovery cycles.

use crate::config::ConfigError;

/// Reasons a cycle is refused before any role agent runs.
///
/// Display strings are user-facing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CycleError {
    #[error("{0}")]
    Configuration(#[from] ConfigError),

    #[error("You must give consent before we can process your input.")]
    ConsentRequired,

    #[error("Please share your feelings or upload screenshots.")]
    EmptySubmission,
}

impl CycleError {
    /// Short machine-readable reason, used in logs and JSON error bodies.
    pub fn reason(&self) -> &'static str {
        match self {
            CycleError::Configuration(_) => "configuration",
            CycleError::ConsentRequired => "consent_required",
            CycleError::EmptySubmission => "empty_submission",
        }
    }
}

/// Result type for cycle operations.
pub type CycleResult<T> = std::result::Result<T, CycleError>;
