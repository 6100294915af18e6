//! HTTP surface: the form, the streamed result page and a JSON endpoint.

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use heartmend_core::{
    is_accepted_image_name, Attachment, CycleError, CycleRequest, MaterializeFailure, NullSink,
    RecoveryRole, RecoveryService, RenderSink, RoleSection, UserSubmission,
};
use serde_json::json;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::StreamExt as _;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::page::{self, NoticeKind};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<RecoveryService>,
}

/// Build the application router.
pub fn router(service: Arc<RecoveryService>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/recovery-plan", post(recovery_plan_html))
        .route("/api/recovery-plan", post(recovery_plan_json))
        .route("/healthz", get(healthz))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { service })
}

/// Multipart payload could not be read.
#[derive(Debug)]
struct UploadError(String);

impl From<MultipartError> for UploadError {
    fn from(err: MultipartError) -> Self {
        UploadError(err.body_text())
    }
}

fn is_checked(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "on" | "true" | "1" | "yes"
    )
}

/// Collect `narrative`, `consent` and `screenshots` fields into a request.
async fn read_cycle_request(mut multipart: Multipart) -> Result<CycleRequest, UploadError> {
    let mut narrative = String::new();
    let mut consent = false;
    let mut attachments = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "narrative" => narrative = field.text().await?,
            "consent" => consent = is_checked(&field.text().await?),
            "screenshots" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_string);
                let data = field.bytes().await?;

                // Browsers send one empty part when no file was picked.
                if file_name.is_empty() && data.is_empty() {
                    continue;
                }
                if !is_accepted_image_name(&file_name) {
                    warn!(file = %file_name, "ignoring upload with unsupported extension");
                    continue;
                }
                let mut attachment = Attachment::new(file_name, data);
                if let Some(ct) = content_type {
                    attachment = attachment.with_content_type(ct);
                }
                attachments.push(attachment);
            }
            other => debug!(field = %other, "ignoring unknown form field"),
        }
    }

    Ok(CycleRequest::new(
        UserSubmission::new(narrative, attachments),
        consent,
    ))
}

fn rejection_status(err: &CycleError) -> StatusCode {
    match err {
        CycleError::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
        CycleError::ConsentRequired | CycleError::EmptySubmission => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
    }
}

fn rejection_page(err: &CycleError) -> Response {
    let html = match err {
        CycleError::Configuration(config) => page::config_error_page(config),
        other => page::form_page(Some((NoticeKind::Warning, &other.to_string()))),
    };
    (rejection_status(err), Html(html)).into_response()
}

async fn index(State(state): State<AppState>) -> Response {
    match state.service.config_error() {
        Some(err) => (StatusCode::SERVICE_UNAVAILABLE, Html(page::config_error_page(err))).into_response(),
        None => Html(page::form_page(Some((
            NoticeKind::Info,
            "Please provide consent to proceed. Your content will not be processed until you consent.",
        ))))
        .into_response(),
    }
}

async fn healthz(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "configured": state.service.is_configured(),
    }))
}

/// Sends rendered HTML chunks down the response body.
struct HtmlSink {
    tx: UnboundedSender<String>,
}

impl RenderSink for HtmlSink {
    fn images_skipped(&mut self, failures: &[MaterializeFailure]) {
        let _ = self.tx.send(page::skipped_images(failures));
    }

    fn role_pending(&mut self, role: RecoveryRole, label: &str) {
        let _ = self.tx.send(page::pending(role, label));
    }

    fn section(&mut self, section: &RoleSection) {
        let _ = self.tx.send(page::section(section));
    }
}

/// Streams each section to the browser as soon as it is ready.
async fn recovery_plan_html(State(state): State<AppState>, multipart: Multipart) -> Response {
    let request = match read_cycle_request(multipart).await {
        Ok(request) => request,
        Err(UploadError(msg)) => {
            let html = page::form_page(Some((NoticeKind::Error, &msg)));
            return (StatusCode::BAD_REQUEST, Html(html)).into_response();
        }
    };
    if let Err(e) = state.service.preflight(&request) {
        return rejection_page(&e);
    }

    let (tx, rx) = mpsc::unbounded_channel();
    let _ = tx.send(page::results_head());

    let service = Arc::clone(&state.service);
    tokio::spawn(async move {
        let mut sink = HtmlSink { tx: tx.clone() };
        tokio::select! {
            // Client went away: dropping the cycle aborts in-flight roles and
            // removes the transient images.
            _ = tx.closed() => info!("client disconnected, cycle cancelled"),
            result = service.submit(&request, &mut sink) => {
                let tail = match result {
                    Ok(report) => page::results_tail(Some(&report)),
                    Err(e) => page::notice(NoticeKind::Warning, &e.to_string()) + &page::results_tail(None),
                };
                let _ = tx.send(tail);
            }
        }
    });

    let stream = UnboundedReceiverStream::new(rx).map(|chunk| Ok::<_, Infallible>(Bytes::from(chunk)));
    (
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        Body::from_stream(stream),
    )
        .into_response()
}

/// Runs the cycle and returns the whole report as JSON.
async fn recovery_plan_json(State(state): State<AppState>, multipart: Multipart) -> Response {
    let request = match read_cycle_request(multipart).await {
        Ok(request) => request,
        Err(UploadError(msg)) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": msg, "reason": "bad_upload" })),
            )
                .into_response();
        }
    };

    match state.service.submit(&request, &mut NullSink).await {
        Ok(report) => Json(report).into_response(),
        Err(e) => (
            rejection_status(&e),
            Json(json!({ "error": e.to_string(), "reason": e.reason() })),
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::http::Request;
    use heartmend_core::{
        AgentResult, CompletionModel, CompletionRequest, ConfigError, Orchestrator,
        OrchestratorConfig,
    };
    use tower::ServiceExt as _;

    const BOUNDARY: &str = "heartmend-test-boundary";

    #[derive(Default)]
    struct EchoModel {
        calls: Mutex<Vec<CompletionRequest>>,
    }

    #[async_trait]
    impl CompletionModel for EchoModel {
        fn model_id(&self) -> &str {
            "echo"
        }

        async fn complete(&self, request: CompletionRequest) -> AgentResult<String> {
            let reply = format!("<p>{}</p> saw {} image(s)", request.agent_name, request.images.len());
            self.calls.lock().unwrap().push(request);
            Ok(reply)
        }
    }

    enum Part<'a> {
        Text(&'a str, &'a str),
        File(&'a str, &'a str, &'a [u8]),
    }

    fn multipart(parts: &[Part<'_>]) -> Vec<u8> {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match part {
                Part::Text(name, value) => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                            .as_bytes(),
                    );
                }
                Part::File(name, file_name, data) => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                             Content-Type: application/octet-stream\r\n\r\n"
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(data);
                    body.extend_from_slice(b"\r\n");
                }
            }
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn post_form(uri: &str, parts: &[Part<'_>]) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart(parts)))
            .unwrap()
    }

    fn get_page(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn ready_app(root: &std::path::Path) -> (Router, Arc<EchoModel>) {
        let model = Arc::new(EchoModel::default());
        let orchestrator = Orchestrator::new(
            model.clone(),
            OrchestratorConfig {
                max_concurrent: 4,
                invoke_timeout: Duration::from_secs(5),
                transient_root: root.to_path_buf(),
            },
        );
        let app = router(Arc::new(RecoveryService::ready(orchestrator)), 1024 * 1024);
        (app, model)
    }

    fn unconfigured_app() -> Router {
        let service = RecoveryService::unconfigured(ConfigError::MissingCredential {
            secrets_file: ".streamlit/secrets.toml".to_string(),
        });
        router(Arc::new(service), 1024 * 1024)
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_index_shows_form_when_configured() {
        let dir = tempfile_dir();
        let (app, _) = ready_app(dir.path());
        let response = app.oneshot(get_page("/")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let html = body_string(response).await;
        assert!(html.contains("<form"));
        assert!(html.contains("Please provide consent to proceed"));
    }

    #[tokio::test]
    async fn test_index_shows_configuration_error_with_both_hints() {
        let response = unconfigured_app().oneshot(get_page("/")).await.unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let html = body_string(response).await;
        assert!(html.contains("gemini_api_key"));
        assert!(html.contains("GEMINI_API_KEY"));
        assert!(!html.contains("<form"));
    }

    #[tokio::test]
    async fn test_unconfigured_service_refuses_submissions() {
        let request = post_form(
            "/api/recovery-plan",
            &[Part::Text("narrative", "hello"), Part::Text("consent", "true")],
        );
        let response = unconfigured_app().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["reason"], "configuration");
    }

    #[tokio::test]
    async fn test_missing_consent_is_rejected_without_invoking_model() {
        let dir = tempfile_dir();
        let (app, model) = ready_app(dir.path());
        let request = post_form("/api/recovery-plan", &[Part::Text("narrative", "hello")]);
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["reason"], "consent_required");
        assert!(model.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_submission_shows_warning_on_form() {
        let dir = tempfile_dir();
        let (app, model) = ready_app(dir.path());
        let request = post_form(
            "/recovery-plan",
            &[Part::Text("narrative", ""), Part::Text("consent", "on")],
        );
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let html = body_string(response).await;
        assert!(html.contains("Please share your feelings or upload screenshots."));
        assert!(model.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_json_endpoint_returns_four_sections_and_drops_non_images() {
        let dir = tempfile_dir();
        let (app, model) = ready_app(dir.path());
        let request = post_form(
            "/api/recovery-plan",
            &[
                Part::Text("narrative", "I feel so empty"),
                Part::Text("consent", "true"),
                Part::File("screenshots", "chat.png", &[1, 2, 3]),
                Part::File("screenshots", "notes.txt", b"not an image"),
            ],
        );
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let report: heartmend_core::CycleReport =
            serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(report.sections.len(), 4);
        assert_eq!(report.image_count, 1);

        let calls = model.calls.lock().unwrap();
        assert_eq!(calls.len(), 4);
        assert!(calls.iter().all(|c| c.images.len() == 1));
        assert!(calls.iter().all(|c| c.prompt.contains("I feel so empty")));
    }

    #[tokio::test]
    async fn test_html_endpoint_streams_sections_in_role_order() {
        let dir = tempfile_dir();
        let (app, _) = ready_app(dir.path());
        let request = post_form(
            "/recovery-plan",
            &[Part::Text("narrative", "it's over"), Part::Text("consent", "on")],
        );
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let html = body_string(response).await;
        assert!(html.contains("Your Personalized Recovery Plan"));

        let positions: Vec<usize> = [
            "🤗 Emotional Support",
            "✍️ Finding Closure",
            "📅 Your Recovery Plan",
            "💪 Honest Perspective",
        ]
        .iter()
        .map(|h| html.find(h).expect("heading present"))
        .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));

        // Model output is escaped, never interpreted.
        assert!(html.contains("&lt;p&gt;Therapist Agent&lt;/p&gt;"));
        assert!(html.trim_end().ends_with("</html>"));
    }

    #[tokio::test]
    async fn test_html_endpoint_streams_pending_lines_before_sections() {
        let dir = tempfile_dir();
        let (app, _) = ready_app(dir.path());
        let request = post_form(
            "/recovery-plan",
            &[Part::Text("narrative", "heavy day"), Part::Text("consent", "on")],
        );
        let html = body_string(app.oneshot(request).await.unwrap()).await;

        let pending = html.find("id=\"pending-therapist\"").expect("pending line");
        let section = html.find("🤗 Emotional Support").expect("section");
        assert!(pending < section);
        assert!(html.contains("🤗 Getting empathetic support..."));
        assert!(html.contains("#pending-honesty { display: none; }"));
    }

    #[tokio::test]
    async fn test_html_endpoint_warns_about_skipped_screenshots() {
        let dir = tempfile_dir();
        // A regular file cannot host the cycle directory, so every image is skipped.
        let not_a_dir = dir.path().join("occupied");
        std::fs::write(&not_a_dir, b"").unwrap();
        let (app, model) = ready_app(&not_a_dir);

        let request = post_form(
            "/recovery-plan",
            &[
                Part::Text("narrative", "it hurts"),
                Part::Text("consent", "on"),
                Part::File("screenshots", "chat.png", &[1, 2, 3]),
            ],
        );
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let html = body_string(response).await;

        let warning = html
            .find("Some screenshots could not be processed and were skipped: chat.png")
            .expect("skipped-image warning");
        let first_section = html.find("🤗 Emotional Support").expect("section");
        assert!(warning < first_section);

        let calls = model.calls.lock().unwrap();
        assert_eq!(calls.len(), 4);
        assert!(calls.iter().all(|c| c.images.is_empty()));
    }

    #[tokio::test]
    async fn test_healthz_reports_configuration() {
        let response = unconfigured_app().oneshot(get_page("/healthz")).await.unwrap();
        let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["configured"], false);
    }

    #[test]
    fn test_consent_values() {
        assert!(is_checked("on"));
        assert!(is_checked("TRUE"));
        assert!(!is_checked(""));
        assert!(!is_checked("off"));
    }

    fn tempfile_dir() -> tempfile::TempDir {
        tempfile::tempdir().unwrap()
    }
}
