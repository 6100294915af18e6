//! Cycle execution: preconditions, image materialization, role fan-out.
//!
//! Roles run strictly in sequence when `max_concurrent` is 1. Otherwise each
//! role gets its own tokio task bounded by a semaphore, and results land in
//! indexed slots so sections still reach the sink in display order, each one
//! as soon as every role before it has finished.

use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::FutureExt as _;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{warn, Instrument as _};
use uuid::Uuid;

use crate::agent::{AgentError, CompletionModel, RoleAgent};
use crate::materialize::{materialize_images, ImageHandle};
use crate::obs;
use crate::orchestration::{
    cycle::{CycleReport, CycleRequest, RenderSink, RoleOutcome, RoleSection},
    error::{CycleError, CycleResult},
};
use crate::prompts::{build_all_prompts, prompt_digest};
use crate::roles::ROLE_TABLE;

/// Configuration for cycle execution.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Maximum number of role invocations in flight. 1 = sequential.
    pub max_concurrent: usize,
    /// Deadline for each single role invocation.
    pub invoke_timeout: Duration,
    /// Parent directory for per-cycle transient image directories.
    pub transient_root: PathBuf,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            invoke_timeout: Duration::from_secs(120),
            transient_root: std::env::temp_dir(),
        }
    }
}

/// Runs recovery cycles against the four role agents.
#[derive(Debug)]
pub struct Orchestrator {
    agents: Vec<RoleAgent>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    /// Bind every row of the role table to `model`.
    pub fn new(model: Arc<dyn CompletionModel>, config: OrchestratorConfig) -> Self {
        let agents = ROLE_TABLE
            .iter()
            .map(|row| RoleAgent::new(row, Arc::clone(&model)))
            .collect();
        Self { agents, config }
    }

    pub fn agents(&self) -> &[RoleAgent] {
        &self.agents
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Consent first, then non-empty input.
    pub fn check_preconditions(request: &CycleRequest) -> CycleResult<()> {
        if !request.consent {
            return Err(CycleError::ConsentRequired);
        }
        if request.submission.is_empty() {
            return Err(CycleError::EmptySubmission);
        }
        Ok(())
    }

    /// Run one cycle, feeding `sink` as sections become ready.
    ///
    /// Returns `Err` only for precondition failures, in which case no agent
    /// was invoked. Role failures are reported inside the [`CycleReport`].
    pub async fn run_cycle(
        &self,
        request: &CycleRequest,
        sink: &mut dyn RenderSink,
    ) -> CycleResult<CycleReport> {
        if let Err(e) = Self::check_preconditions(request) {
            obs::emit_cycle_rejected(e.reason());
            return Err(e);
        }

        let cycle_id = Uuid::new_v4();
        let report = self
            .execute(cycle_id, request, sink)
            .instrument(obs::cycle_span(cycle_id))
            .await;
        Ok(report)
    }

    async fn execute(
        &self,
        cycle_id: Uuid,
        request: &CycleRequest,
        sink: &mut dyn RenderSink,
    ) -> CycleReport {
        let started_at = Utc::now();
        let clock = Instant::now();
        let submission = &request.submission;
        obs::emit_cycle_started(
            cycle_id,
            submission.narrative().chars().count(),
            submission.attachments().len(),
        );

        // Lives until every role has finished; dropping it removes the files.
        let images = materialize_images(&self.config.transient_root, submission.attachments());
        if !images.failures().is_empty() {
            obs::emit_images_skipped(cycle_id, images.failures().len());
            sink.images_skipped(images.failures());
        }
        let handles: Arc<[ImageHandle]> = Arc::from(images.handles());

        let prompts: Vec<String> = build_all_prompts(submission.narrative())
            .into_iter()
            .map(|(_, prompt)| prompt)
            .collect();
        let digest = prompt_digest(prompts.iter().map(String::as_str));

        let sections = if self.config.max_concurrent <= 1 {
            self.run_sequential(cycle_id, prompts, &handles, sink).await
        } else {
            self.run_concurrent(cycle_id, prompts, &handles, sink).await
        };

        let report = CycleReport {
            cycle_id,
            started_at,
            finished_at: Utc::now(),
            prompt_digest: digest,
            image_count: handles.len(),
            skipped_images: images.failures().to_vec(),
            sections,
        };
        drop(images);

        let failed = report.failed_roles().len();
        obs::emit_cycle_finished(
            cycle_id,
            clock.elapsed().as_millis() as u64,
            report.sections.len() - failed,
            failed,
            &report.prompt_digest,
        );
        report
    }

    async fn run_sequential(
        &self,
        cycle_id: Uuid,
        prompts: Vec<String>,
        images: &Arc<[ImageHandle]>,
        sink: &mut dyn RenderSink,
    ) -> Vec<RoleSection> {
        let mut sections = Vec::with_capacity(self.agents.len());
        for (agent, prompt) in self.agents.iter().zip(prompts) {
            announce(cycle_id, agent, sink);
            let outcome = invoke_isolated(agent, &prompt, images, self.config.invoke_timeout).await;
            sections.push(render(cycle_id, agent, outcome, sink));
        }
        sections
    }

    async fn run_concurrent(
        &self,
        cycle_id: Uuid,
        prompts: Vec<String>,
        images: &Arc<[ImageHandle]>,
        sink: &mut dyn RenderSink,
    ) -> Vec<RoleSection> {
        let sem = Arc::new(Semaphore::new(self.config.max_concurrent));
        let timeout = self.config.invoke_timeout;

        // Dropping the set (cycle cancelled) aborts every in-flight role.
        let mut set = JoinSet::new();
        for (index, (agent, prompt)) in self.agents.iter().zip(prompts).enumerate() {
            announce(cycle_id, agent, sink);
            let agent = agent.clone();
            let images = Arc::clone(images);
            let sem = Arc::clone(&sem);
            let task = async move {
                let _permit = sem.acquire_owned().await.ok();
                let outcome = invoke_isolated(&agent, &prompt, &images, timeout).await;
                (index, outcome)
            };
            set.spawn(task.in_current_span());
        }

        let mut slots: Vec<Option<RoleOutcome>> = vec![None; self.agents.len()];
        let mut sections = Vec::with_capacity(self.agents.len());
        let mut next = 0;

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((index, outcome)) => slots[index] = Some(outcome),
                Err(e) => warn!(error = %e, "role task did not complete"),
            }
            while next < slots.len() {
                let Some(outcome) = slots[next].take() else {
                    break;
                };
                sections.push(render(cycle_id, &self.agents[next], outcome, sink));
                next += 1;
            }
        }

        // Slots left empty belong to tasks that were aborted.
        for (index, agent) in self.agents.iter().enumerate().skip(next) {
            let outcome = slots[index].take().unwrap_or(RoleOutcome::Failed {
                error: "role task aborted".to_string(),
            });
            sections.push(render(cycle_id, agent, outcome, sink));
        }
        sections
    }
}

fn announce(cycle_id: Uuid, agent: &RoleAgent, sink: &mut dyn RenderSink) {
    let label = agent.config().pending_label;
    obs::emit_role_pending(cycle_id, agent.role(), label);
    sink.role_pending(agent.role(), label);
}

/// [`invoke_role`] with a panic in the model turned into a failed section.
async fn invoke_isolated(
    agent: &RoleAgent,
    prompt: &str,
    images: &[ImageHandle],
    timeout: Duration,
) -> RoleOutcome {
    AssertUnwindSafe(invoke_role(agent, prompt, images, timeout))
        .catch_unwind()
        .await
        .unwrap_or_else(|_| {
            warn!(role = %agent.role(), "role invocation panicked");
            RoleOutcome::Failed {
                error: "role task panicked".to_string(),
            }
        })
}

async fn invoke_role(
    agent: &RoleAgent,
    prompt: &str,
    images: &[ImageHandle],
    timeout: Duration,
) -> RoleOutcome {
    match tokio::time::timeout(timeout, agent.invoke(prompt, images)).await {
        Ok(Ok(response)) => RoleOutcome::Completed { response },
        Ok(Err(e)) => {
            warn!(role = %agent.role(), error = %e, "role invocation failed");
            RoleOutcome::Failed {
                error: e.to_string(),
            }
        }
        Err(_) => {
            let e = AgentError::Timeout(timeout);
            warn!(role = %agent.role(), error = %e, "role invocation timed out");
            RoleOutcome::Failed {
                error: e.to_string(),
            }
        }
    }
}

fn render(
    cycle_id: Uuid,
    agent: &RoleAgent,
    outcome: RoleOutcome,
    sink: &mut dyn RenderSink,
) -> RoleSection {
    let section = RoleSection::new(agent.role(), outcome);
    obs::emit_role_finished(cycle_id, agent.role(), section.is_success());
    sink.section(&section);
    section
}
