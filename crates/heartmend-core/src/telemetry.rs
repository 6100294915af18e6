//! Tracing initialisation for HeartMend binaries.
//!
//! Call [`init_tracing`] once at program start. Later calls are ignored.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable that switches log lines to JSON when set to `json`.
pub const LOG_FORMAT_ENV: &str = "HEARTMEND_LOG_FORMAT";

/// Filter used when `RUST_LOG` is unset: `level` for our crates, quieter
/// HTTP internals.
pub fn default_filter(level: Level) -> String {
    format!("{},hyper=warn,reqwest=warn,h2=warn", level.as_str().to_lowercase())
}

/// Install the global subscriber.
///
/// * `json` - newline-delimited JSON output; also enabled by
///   `HEARTMEND_LOG_FORMAT=json`.
/// * `level` - default verbosity when `RUST_LOG` is not set.
pub fn init_tracing(json: bool, level: Level) {
    let json = json
        || std::env::var(LOG_FORMAT_ENV)
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(level)));

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry
            .with(fmt::layer().with_target(false).json())
            .try_init()
            .ok();
    } else {
        registry.with(fmt::layer().with_target(false)).try_init().ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_quiets_http_internals() {
        let filter = default_filter(Level::DEBUG);
        assert!(filter.starts_with("debug,"));
        assert!(filter.contains("hyper=warn"));
    }

    #[test]
    fn test_init_tracing_is_idempotent() {
        init_tracing(false, Level::INFO);
        init_tracing(true, Level::DEBUG);
    }
}
