//! The front door for submissions: either a ready orchestrator or a
//! configuration error that refuses every submission.

use std::sync::Arc;

use tracing::{error, info};

use crate::agent::GeminiClient;
use crate::config::{ConfigError, GeminiConfig, ResolvedCredential};
use crate::obs;
use crate::orchestration::{
    cycle::{CycleReport, CycleRequest, RenderSink},
    error::{CycleError, CycleResult},
    executor::{Orchestrator, OrchestratorConfig},
};

/// Accepts or refuses submissions depending on startup configuration.
#[derive(Debug)]
pub struct RecoveryService {
    inner: Result<Orchestrator, ConfigError>,
}

impl RecoveryService {
    pub fn ready(orchestrator: Orchestrator) -> Self {
        Self {
            inner: Ok(orchestrator),
        }
    }

    pub fn unconfigured(err: ConfigError) -> Self {
        Self { inner: Err(err) }
    }

    /// Build the production service from the startup credential lookup.
    ///
    /// The credential is consumed here and never read again.
    pub fn from_credential(
        credential: Result<ResolvedCredential, ConfigError>,
        gemini: GeminiConfig,
        config: OrchestratorConfig,
    ) -> Self {
        let built = credential.and_then(|resolved| {
            info!(source = %resolved.source, model = %gemini.model, "completion client configured");
            GeminiClient::new(gemini, resolved.key)
        });

        match built {
            Ok(client) => Self::ready(Orchestrator::new(Arc::new(client), config)),
            Err(e) => {
                error!(error = %e, "submissions will be refused");
                Self::unconfigured(e)
            }
        }
    }

    pub fn is_configured(&self) -> bool {
        self.inner.is_ok()
    }

    pub fn config_error(&self) -> Option<&ConfigError> {
        self.inner.as_ref().err()
    }

    /// Check every precondition without running anything.
    ///
    /// Order: configuration, consent, non-empty input.
    pub fn preflight(&self, request: &CycleRequest) -> CycleResult<&Orchestrator> {
        let orchestrator = match &self.inner {
            Ok(orchestrator) => orchestrator,
            Err(e) => {
                let err = CycleError::Configuration(e.clone());
                obs::emit_cycle_rejected(err.reason());
                return Err(err);
            }
        };
        if let Err(e) = Orchestrator::check_preconditions(request) {
            obs::emit_cycle_rejected(e.reason());
            return Err(e);
        }
        Ok(orchestrator)
    }

    /// Run one cycle if every precondition holds.
    pub async fn submit(
        &self,
        request: &CycleRequest,
        sink: &mut dyn RenderSink,
    ) -> CycleResult<CycleReport> {
        let orchestrator = self.preflight(request)?;
        orchestrator.run_cycle(request, sink).await
    }
}
