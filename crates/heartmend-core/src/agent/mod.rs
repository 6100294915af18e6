//! Role agents: a static role configuration paired with a shared completion model.
//!
//! # Module layout
//!
//! - [`error`] - `AgentError`, `AgentResult`
//! - [`gemini`] - `GeminiClient`, the production [`CompletionModel`]

pub mod error;
pub mod gemini;

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::materialize::ImageHandle;
use crate::roles::{RecoveryRole, RoleAgentConfig, RoleCapability};

pub use error::{AgentError, AgentResult};
pub use gemini::GeminiClient;

/// Appended to every role's instruction set.
pub const MARKDOWN_DIRECTIVE: &str = "Use markdown to format your answers.";

/// Image bytes ready to be sent inline with a completion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub source_name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// Everything a completion model needs for one stateless call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub agent_name: String,
    pub system_instructions: Vec<String>,
    pub prompt: String,
    pub images: Vec<InlineImage>,
    pub web_search: bool,
}

/// A remote text-generation model.
///
/// Inject a deterministic stub in tests; [`GeminiClient`] in production.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    /// Identifier reported in [`AgentResponse::model`].
    fn model_id(&self) -> &str;

    /// Run one completion and return its text.
    async fn complete(&self, request: CompletionRequest) -> AgentResult<String>;
}

/// Text produced by one role for one cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub role: RecoveryRole,
    pub role_name: String,
    pub content: String,
    pub model: String,
    pub latency_ms: u64,
}

/// One role bound to the shared model.
#[derive(Clone)]
pub struct RoleAgent {
    config: &'static RoleAgentConfig,
    model: Arc<dyn CompletionModel>,
}

impl std::fmt::Debug for RoleAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoleAgent")
            .field("role", &self.config.role)
            .field("model", &self.model.model_id())
            .finish()
    }
}

impl RoleAgent {
    pub fn new(config: &'static RoleAgentConfig, model: Arc<dyn CompletionModel>) -> Self {
        Self { config, model }
    }

    pub fn role(&self) -> RecoveryRole {
        self.config.role
    }

    pub fn config(&self) -> &'static RoleAgentConfig {
        self.config
    }

    /// The role's directives followed by the markdown directive.
    pub fn system_instructions(&self) -> Vec<String> {
        self.config
            .instructions
            .iter()
            .map(|s| s.to_string())
            .chain(std::iter::once(MARKDOWN_DIRECTIVE.to_string()))
            .collect()
    }

    /// Send `prompt` and `images` to the model and wait for the completion.
    ///
    /// No history is kept between calls.
    #[instrument(skip(self, prompt, images), fields(role = %self.config.role, images = images.len()))]
    pub async fn invoke(&self, prompt: &str, images: &[ImageHandle]) -> AgentResult<AgentResponse> {
        let mut inline = Vec::with_capacity(images.len());
        for handle in images {
            let data = tokio::fs::read(&handle.transient_path)
                .await
                .map_err(|source| AgentError::Image {
                    name: handle.source_name.clone(),
                    source,
                })?;
            inline.push(InlineImage {
                source_name: handle.source_name.clone(),
                mime_type: handle.mime_type.to_string(),
                data,
            });
        }

        let request = CompletionRequest {
            agent_name: self.config.name.to_string(),
            system_instructions: self.system_instructions(),
            prompt: prompt.to_string(),
            images: inline,
            web_search: self.config.has_capability(RoleCapability::WebSearch),
        };

        let started = Instant::now();
        let content = self.model.complete(request).await?;
        let latency_ms = started.elapsed().as_millis() as u64;
        debug!(latency_ms, chars = content.len(), "completion received");

        Ok(AgentResponse {
            role: self.config.role,
            role_name: self.config.name.to_string(),
            content,
            model: self.model.model_id().to_string(),
            latency_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tokio::sync::Mutex;

    struct RecordingModel {
        seen: Mutex<Vec<CompletionRequest>>,
    }

    #[async_trait]
    impl CompletionModel for RecordingModel {
        fn model_id(&self) -> &str {
            "recording"
        }

        async fn complete(&self, request: CompletionRequest) -> AgentResult<String> {
            let reply = format!("ack {}", request.agent_name);
            self.seen.lock().await.push(request);
            Ok(reply)
        }
    }

    fn recording() -> Arc<RecordingModel> {
        Arc::new(RecordingModel {
            seen: Mutex::new(Vec::new()),
        })
    }

    #[tokio::test]
    async fn test_invoke_sends_instructions_prompt_and_images() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("00-chat.png");
        std::fs::write(&path, [1u8, 2, 3]).unwrap();
        let handle = ImageHandle {
            source_name: "chat.png".to_string(),
            transient_path: path,
            mime_type: "image/png",
        };

        let model = recording();
        let agent = RoleAgent::new(RecoveryRole::Honesty.config(), model.clone());
        let response = agent.invoke("prompt text", &[handle]).await.unwrap();

        assert_eq!(response.role, RecoveryRole::Honesty);
        assert_eq!(response.content, "ack Brutal Honesty Agent");
        assert_eq!(response.model, "recording");

        let seen = model.seen.lock().await;
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].prompt, "prompt text");
        assert!(seen[0].web_search);
        assert_eq!(seen[0].images[0].data, vec![1u8, 2, 3]);
        assert_eq!(seen[0].images[0].mime_type, "image/png");
        assert_eq!(
            seen[0].system_instructions.last().map(String::as_str),
            Some(MARKDOWN_DIRECTIVE)
        );
    }

    #[tokio::test]
    async fn test_invoke_without_web_search_capability() {
        let model = recording();
        let agent = RoleAgent::new(RecoveryRole::Closure.config(), model.clone());
        agent.invoke("p", &[]).await.unwrap();
        assert!(!model.seen.lock().await[0].web_search);
    }

    #[tokio::test]
    async fn test_invoke_fails_on_missing_image_handle() {
        let handle = ImageHandle {
            source_name: "gone.jpg".to_string(),
            transient_path: PathBuf::from("/nonexistent/heartmend/gone.jpg"),
            mime_type: "image/jpeg",
        };
        let model = recording();
        let agent = RoleAgent::new(RecoveryRole::Therapist.config(), model.clone());

        let err = agent.invoke("p", &[handle]).await.unwrap_err();
        assert!(matches!(err, AgentError::Image { ref name, .. } if name == "gone.jpg"));
        assert!(model.seen.lock().await.is_empty());
    }
}
