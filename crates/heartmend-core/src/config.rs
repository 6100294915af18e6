//! Credential resolution and completion-client configuration.
//!
//! The API credential is resolved exactly once at process start and handed
//! to the completion client as an immutable [`ApiKey`]. Lookup order:
//!
//! 1. the secrets file (TOML) under the key `gemini_api_key`
//! 2. the `GEMINI_API_KEY` environment variable
//!
//! Blank values count as absent.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

/// Key looked up in the secrets file.
pub const SECRETS_KEY: &str = "gemini_api_key";

/// Environment variable consulted when the secrets file has no key.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Default location of the secrets file, relative to the working directory.
pub const DEFAULT_SECRETS_FILE: &str = ".streamlit/secrets.toml";

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "gemini-2.5-pro";

/// Public Generative Language API host.
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";

/// Startup configuration errors. Any of these blocks all submissions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error(
        "Gemini API key not found. Please set it as `gemini_api_key = \"YOUR_KEY_HERE\"` \
         in {secrets_file} or `export GEMINI_API_KEY=YOUR_KEY`"
    )]
    MissingCredential { secrets_file: String },

    #[error("failed to build completion client: {0}")]
    ClientBuild(String),
}

/// An API credential. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Wrap a raw key, rejecting empty or whitespace-only strings.
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// Where a credential was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    SecretsFile(PathBuf),
    Environment,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::SecretsFile(path) => write!(f, "secrets file {}", path.display()),
            CredentialSource::Environment => write!(f, "environment variable {API_KEY_ENV}"),
        }
    }
}

/// A resolved credential plus its origin (the origin is logged, the key never is).
#[derive(Debug, Clone)]
pub struct ResolvedCredential {
    pub key: ApiKey,
    pub source: CredentialSource,
}

/// Resolve the credential from `secrets_file`, falling back to the process
/// environment.
pub fn resolve_api_key(secrets_file: &Path) -> Result<ResolvedCredential, ConfigError> {
    resolve_api_key_from(secrets_file, std::env::var(API_KEY_ENV).ok())
}

/// Same as [`resolve_api_key`] with the environment value injected.
pub fn resolve_api_key_from(
    secrets_file: &Path,
    env_value: Option<String>,
) -> Result<ResolvedCredential, ConfigError> {
    if let Some(key) = read_secrets_key(secrets_file) {
        info!(source = %secrets_file.display(), "resolved API key from secrets file");
        return Ok(ResolvedCredential {
            key,
            source: CredentialSource::SecretsFile(secrets_file.to_path_buf()),
        });
    }

    if let Some(key) = env_value.and_then(ApiKey::new) {
        info!(source = API_KEY_ENV, "resolved API key from environment");
        return Ok(ResolvedCredential {
            key,
            source: CredentialSource::Environment,
        });
    }

    Err(ConfigError::MissingCredential {
        secrets_file: secrets_file.display().to_string(),
    })
}

/// A missing or malformed secrets file is not an error; lookup falls through
/// to the environment.
fn read_secrets_key(path: &Path) -> Option<ApiKey> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "secrets file not readable");
            return None;
        }
    };

    let table: toml::Table = match content.parse() {
        Ok(table) => table,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring malformed secrets file");
            return None;
        }
    };

    table
        .get(SECRETS_KEY)
        .and_then(|v| v.as_str())
        .and_then(ApiKey::new)
}

/// Settings for the Gemini completion client.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// Scheme + host, without trailing slash.
    pub api_base: String,
    pub model: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

impl GeminiConfig {
    /// `generateContent` endpoint for the configured model.
    pub fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.api_base.trim_end_matches('/'),
            self.model
        )
    }
}
