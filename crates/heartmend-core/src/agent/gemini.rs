//! Gemini `generateContent` client.
//!
//! Images travel inline as base64 parts; the web-search capability maps to
//! the `google_search` grounding tool.

use std::time::Duration;

use async_trait::async_trait;
use base64::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::agent::{AgentError, AgentResult, CompletionModel, CompletionRequest};
use crate::config::{ApiKey, ConfigError, GeminiConfig};

const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateContentRequest {
    pub system_instruction: Content,
    pub contents: Vec<Content>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Tool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub(crate) enum Part {
    Text {
        text: String,
    },
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: Blob,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Blob {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Tool {
    pub google_search: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Translate a [`CompletionRequest`] into the wire body.
pub(crate) fn build_request_body(request: &CompletionRequest) -> GenerateContentRequest {
    let mut parts = Vec::with_capacity(1 + request.images.len());
    parts.push(Part::Text {
        text: request.prompt.clone(),
    });
    for image in &request.images {
        parts.push(Part::Inline {
            inline_data: Blob {
                mime_type: image.mime_type.clone(),
                data: BASE64_STANDARD.encode(&image.data),
            },
        });
    }

    let tools = if request.web_search {
        vec![Tool {
            google_search: serde_json::Map::new(),
        }]
    } else {
        Vec::new()
    };

    GenerateContentRequest {
        system_instruction: Content {
            role: None,
            parts: vec![Part::Text {
                text: request.system_instructions.join("\n"),
            }],
        },
        contents: vec![Content {
            role: Some("user".to_string()),
            parts,
        }],
        tools,
    }
}

/// Concatenate the text parts of the first candidate.
pub(crate) fn parse_completion(body: &str) -> AgentResult<String> {
    let response: GenerateContentResponse = serde_json::from_str(body)?;

    if response.candidates.is_empty() {
        if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
            warn!(block_reason = %reason, "prompt was blocked");
        }
        return Err(AgentError::EmptyCompletion);
    }

    let candidate = &response.candidates[0];
    let text: String = candidate
        .content
        .iter()
        .flat_map(|c| c.parts.iter())
        .filter_map(|p| p.text.as_deref())
        .collect();

    if text.trim().is_empty() {
        debug!(finish_reason = ?candidate.finish_reason, "candidate carried no text");
        return Err(AgentError::EmptyCompletion);
    }
    Ok(text)
}

/// Map a non-success status and body to an [`AgentError`].
pub(crate) fn classify_failure(status: u16, body: &str) -> AgentError {
    match status {
        401 | 403 => AgentError::Auth { status },
        429 => AgentError::RateLimited,
        _ => {
            let message = serde_json::from_str::<ErrorEnvelope>(body)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| body.chars().take(200).collect());
            AgentError::Api { status, message }
        }
    }
}

/// HTTP client for the Gemini completion endpoint.
pub struct GeminiClient {
    config: GeminiConfig,
    api_key: ApiKey,
    http_client: reqwest::Client,
}

impl GeminiClient {
    /// Build the client. Fails only if the TLS/HTTP stack cannot be initialised.
    pub fn new(config: GeminiConfig, api_key: ApiKey) -> Result<Self, ConfigError> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("heartmend/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ConfigError::ClientBuild(e.to_string()))?;

        Ok(Self {
            config,
            api_key,
            http_client,
        })
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }
}

#[async_trait]
impl CompletionModel for GeminiClient {
    fn model_id(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, request: CompletionRequest) -> AgentResult<String> {
        let body = build_request_body(&request);
        debug!(
            agent = %request.agent_name,
            images = request.images.len(),
            web_search = request.web_search,
            "sending generateContent request"
        );

        let response = self
            .http_client
            .post(self.config.endpoint())
            .header(API_KEY_HEADER, self.api_key.expose())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(classify_failure(status.as_u16(), &text));
        }
        parse_completion(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::InlineImage;

    fn request(web_search: bool) -> CompletionRequest {
        CompletionRequest {
            agent_name: "Therapist Agent".to_string(),
            system_instructions: vec!["line one".to_string(), "line two".to_string()],
            prompt: "hello".to_string(),
            images: vec![InlineImage {
                source_name: "a.png".to_string(),
                mime_type: "image/png".to_string(),
                data: b"abc".to_vec(),
            }],
            web_search,
        }
    }

    #[test]
    fn test_request_body_wire_shape() {
        let body = serde_json::to_value(build_request_body(&request(false))).unwrap();

        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "line one\nline two");
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "hello");
        assert_eq!(body["contents"][0]["parts"][1]["inlineData"]["mimeType"], "image/png");
        assert_eq!(body["contents"][0]["parts"][1]["inlineData"]["data"], "YWJj");
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn test_web_search_adds_google_search_tool() {
        let body = serde_json::to_value(build_request_body(&request(true))).unwrap();
        assert_eq!(body["tools"], serde_json::json!([{ "google_search": {} }]));
    }

    #[test]
    fn test_parse_completion_joins_text_parts() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"Hello, "},{"text":"friend."}]},"finishReason":"STOP"}]}"#;
        assert_eq!(parse_completion(body).unwrap(), "Hello, friend.");
    }

    #[test]
    fn test_parse_completion_without_candidates_is_empty() {
        let body = r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#;
        assert!(matches!(parse_completion(body), Err(AgentError::EmptyCompletion)));
    }

    #[test]
    fn test_parse_completion_rejects_garbage() {
        assert!(matches!(parse_completion("not json"), Err(AgentError::Decode(_))));
    }

    #[test]
    fn test_classify_failure() {
        assert!(matches!(classify_failure(403, ""), AgentError::Auth { status: 403 }));
        assert!(matches!(classify_failure(429, ""), AgentError::RateLimited));

        let body = r#"{"error":{"code":400,"message":"Invalid image","status":"INVALID_ARGUMENT"}}"#;
        match classify_failure(400, body) {
            AgentError::Api { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "Invalid image");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }
}
