//! Cycle vocabulary: requests, per-role sections, reports and render sinks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::agent::AgentResponse;
use crate::materialize::MaterializeFailure;
use crate::roles::RecoveryRole;
use crate::submission::UserSubmission;

/// One user-triggered submission plus the consent flag that gates it.
#[derive(Debug, Clone, Default)]
pub struct CycleRequest {
    pub submission: UserSubmission,
    pub consent: bool,
}

impl CycleRequest {
    pub fn new(submission: UserSubmission, consent: bool) -> Self {
        Self {
            submission,
            consent,
        }
    }
}

/// How one role ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RoleOutcome {
    Completed { response: AgentResponse },
    /// Scoped to this role; other roles still ran.
    Failed { error: String },
}

/// One rendered output section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSection {
    pub role: RecoveryRole,
    pub heading: String,
    pub outcome: RoleOutcome,
}

impl RoleSection {
    pub fn new(role: RecoveryRole, outcome: RoleOutcome) -> Self {
        Self {
            role,
            heading: role.config().heading.to_string(),
            outcome,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, RoleOutcome::Completed { .. })
    }

    /// Response text, if the role completed.
    pub fn content(&self) -> Option<&str> {
        match &self.outcome {
            RoleOutcome::Completed { response } => Some(&response.content),
            RoleOutcome::Failed { .. } => None,
        }
    }
}

/// Summary of a finished cycle. Sections are in display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// SHA-256 over the four prompts; equal for identical narratives.
    pub prompt_digest: String,
    pub image_count: usize,
    pub skipped_images: Vec<MaterializeFailure>,
    pub sections: Vec<RoleSection>,
}

impl CycleReport {
    pub fn failed_roles(&self) -> Vec<RecoveryRole> {
        self.sections
            .iter()
            .filter(|s| !s.is_success())
            .map(|s| s.role)
            .collect()
    }
}

/// Output surface fed while a cycle runs.
///
/// `section` is called exactly once per role, in display order. Every
/// `role_pending` call is followed later by the `section` for that role.
pub trait RenderSink: Send {
    /// Attachments dropped before any role ran.
    fn images_skipped(&mut self, _failures: &[MaterializeFailure]) {}

    /// A role has started generating; `label` is its progress text.
    fn role_pending(&mut self, _role: RecoveryRole, _label: &str) {}

    fn section(&mut self, section: &RoleSection);
}

/// Collects sections in memory.
impl RenderSink for Vec<RoleSection> {
    fn section(&mut self, section: &RoleSection) {
        self.push(section.clone());
    }
}

/// Discards everything; the caller only wants the [`CycleReport`].
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl RenderSink for NullSink {
    fn section(&mut self, _section: &RoleSection) {}
}
