//! HeartMend UI server.
//!
//! Serves the single-page breakup recovery form and runs one recovery cycle
//! per submission. The Gemini credential is resolved once at startup; when it
//! is missing the server still starts, shows the configuration error and
//! refuses every submission.

mod page;
mod web;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use heartmend_core::config::{DEFAULT_API_BASE, DEFAULT_MODEL};
use heartmend_core::{
    init_tracing, resolve_api_key, GeminiConfig, OrchestratorConfig, RecoveryService,
    DEFAULT_SECRETS_FILE,
};
use tracing::{info, warn, Level};

#[derive(Parser, Debug)]
#[command(name = "heartmendd")]
#[command(author = "HeartMend Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "HeartMend breakup recovery UI server", long_about = None)]
struct Cli {
    /// Address to listen on
    #[arg(long, env = "HEARTMEND_BIND", default_value = "127.0.0.1:8501")]
    bind: SocketAddr,

    /// Gemini model id
    #[arg(long, env = "GEMINI_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    /// Base URL of the Generative Language API
    #[arg(long, env = "GEMINI_API_BASE", default_value = DEFAULT_API_BASE)]
    api_base: String,

    /// TOML secrets file consulted for `gemini_api_key` before the environment
    #[arg(long, env = "HEARTMEND_SECRETS_FILE", default_value = DEFAULT_SECRETS_FILE)]
    secrets_file: PathBuf,

    /// Per-role completion timeout in seconds
    #[arg(long, env = "HEARTMEND_TIMEOUT_SECS", default_value_t = 120)]
    timeout_secs: u64,

    /// Role invocations in flight per cycle (1 = strictly sequential)
    #[arg(long, env = "HEARTMEND_MAX_CONCURRENT", default_value_t = 4)]
    max_concurrent: usize,

    /// Maximum upload size per submission, in MiB
    #[arg(long, env = "HEARTMEND_MAX_UPLOAD_MB", default_value_t = 25)]
    max_upload_mb: usize,

    /// Parent directory for per-cycle transient image directories (default: OS temp dir)
    #[arg(long, env = "HEARTMEND_TRANSIENT_DIR")]
    transient_dir: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn gemini_config(&self) -> GeminiConfig {
        GeminiConfig {
            api_base: self.api_base.clone(),
            model: self.model.clone(),
        }
    }

    fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            max_concurrent: self.max_concurrent.max(1),
            invoke_timeout: Duration::from_secs(self.timeout_secs.max(1)),
            transient_root: self
                .transient_dir
                .clone()
                .unwrap_or_else(std::env::temp_dir),
        }
    }

    fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env before parsing so env-backed flags see it.
    let dotenv = dotenvy::dotenv();
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    init_tracing(cli.json, level);

    match dotenv {
        Ok(path) => info!(path = %path.display(), "loaded .env"),
        Err(e) if e.not_found() => {}
        Err(e) => warn!(error = %e, "failed to load .env"),
    }

    let credential = resolve_api_key(&cli.secrets_file);
    let service = RecoveryService::from_credential(
        credential,
        cli.gemini_config(),
        cli.orchestrator_config(),
    );

    let app = web::router(Arc::new(service), cli.max_upload_bytes());
    let listener = tokio::net::TcpListener::bind(cli.bind)
        .await
        .with_context(|| format!("Failed to bind {}", cli.bind))?;
    info!(addr = %cli.bind, version = heartmend_core::VERSION, "heartmendd listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;
    Ok(())
}
