//! HeartMend Core Library
//!
//! A submission (narrative text plus optional screenshots) is fanned out to
//! four role agents sharing one hosted completion model:
//!
//! ```text
//! UserSubmission ──► materialize_images ──► Orchestrator
//!                                             ├─► therapist
//!                                             ├─► closure
//!                                             ├─► routine planner
//!                                             └─► honesty (+ web search)
//!                                                   │
//!                                   RenderSink ◄────┘ (fixed role order)
//! ```

pub mod agent;
pub mod config;
pub mod materialize;
pub mod obs;
pub mod orchestration;
pub mod prompts;
pub mod roles;
pub mod submission;
pub mod telemetry;

pub use agent::{
    AgentError, AgentResponse, AgentResult, CompletionModel, CompletionRequest, GeminiClient,
    InlineImage, RoleAgent, MARKDOWN_DIRECTIVE,
};
pub use config::{
    resolve_api_key, resolve_api_key_from, ApiKey, ConfigError, CredentialSource, GeminiConfig,
    ResolvedCredential, API_KEY_ENV, DEFAULT_SECRETS_FILE, SECRETS_KEY,
};
pub use materialize::{materialize_images, ImageHandle, MaterializeFailure, MaterializedImages};
pub use orchestration::cycle::{
    CycleReport, CycleRequest, NullSink, RenderSink, RoleOutcome, RoleSection,
};
pub use orchestration::error::{CycleError, CycleResult};
pub use orchestration::executor::{Orchestrator, OrchestratorConfig};
pub use orchestration::service::RecoveryService;
pub use prompts::{build_all_prompts, build_prompt, prompt_digest};
pub use roles::{RecoveryRole, RoleAgentConfig, RoleCapability, REGISTER_DIRECTIVE, ROLE_TABLE};
pub use submission::{
    is_accepted_image_name, resolve_mime_type, Attachment, AttachmentSource, UserSubmission,
};
pub use telemetry::init_tracing;

/// HeartMend version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
