//! Recovery cycle orchestration.
//!
//! One cycle takes a [`cycle::CycleRequest`], materializes its images, builds
//! one prompt per role and invokes the four role agents, rendering each
//! section in the fixed role order.
//!
//! # Module layout
//!
//! - [`cycle`] - `CycleRequest`, `RoleSection`, `RoleOutcome`, `CycleReport`, `RenderSink`
//! - [`error`] - `CycleError`, `CycleResult`
//! - [`executor`] - `Orchestrator`, `OrchestratorConfig`
//! - [`service`] - `RecoveryService`, the configured-or-refusing front door

pub mod cycle;
pub mod error;
pub mod executor;
pub mod service;
