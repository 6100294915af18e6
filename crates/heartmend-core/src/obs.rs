//! Structured observability hooks for the recovery cycle lifecycle.
//!
//! This module provides:
//! - A cycle-scoped span constructor for instrumenting async work
//! - Emission functions for key lifecycle events: start, rejection, skipped
//!   images, per-role completion, finish
//!
//! Events are emitted at `info!` level (warnings at `warn!`). Set
//! `HEARTMEND_LOG_FORMAT=json` or pass `--json` for JSON output.

use tracing::{info, warn};
use uuid::Uuid;

use crate::roles::RecoveryRole;

/// Span tagged with the cycle id. Attach with `Instrument::instrument`.
pub fn cycle_span(cycle_id: Uuid) -> tracing::Span {
    tracing::info_span!("heartmend.cycle", cycle_id = %cycle_id)
}

/// Emit event: cycle accepted and started.
pub fn emit_cycle_started(cycle_id: Uuid, narrative_chars: usize, attachments: usize) {
    info!(
        event = "cycle.started",
        cycle_id = %cycle_id,
        narrative_chars = narrative_chars,
        attachments = attachments,
    );
}

/// Emit event: cycle refused before any agent ran.
pub fn emit_cycle_rejected(reason: &str) {
    warn!(event = "cycle.rejected", reason = %reason);
}

/// Emit event: attachments dropped during materialization.
pub fn emit_images_skipped(cycle_id: Uuid, skipped: usize) {
    warn!(event = "cycle.images_skipped", cycle_id = %cycle_id, skipped = skipped);
}

/// Emit event: role is about to be awaited.
pub fn emit_role_pending(cycle_id: Uuid, role: RecoveryRole, label: &str) {
    info!(event = "role.pending", cycle_id = %cycle_id, role = %role, label = %label);
}

/// Emit event: role finished, successfully or not.
pub fn emit_role_finished(cycle_id: Uuid, role: RecoveryRole, success: bool) {
    if success {
        info!(event = "role.finished", cycle_id = %cycle_id, role = %role, success = true);
    } else {
        warn!(event = "role.finished", cycle_id = %cycle_id, role = %role, success = false);
    }
}

/// Emit event: every section has been rendered.
pub fn emit_cycle_finished(
    cycle_id: Uuid,
    duration_ms: u64,
    succeeded: usize,
    failed: usize,
    prompt_digest: &str,
) {
    info!(
        event = "cycle.finished",
        cycle_id = %cycle_id,
        duration_ms = duration_ms,
        succeeded = succeeded,
        failed = failed,
        prompt_digest = %prompt_digest,
    );
}
