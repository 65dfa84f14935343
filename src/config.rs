//! Process configuration.
//!
//! Built once at startup from environment variables (after `dotenv` has run)
//! and passed by reference into every component. Nothing re-reads the
//! environment after this point.

use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration for the server and both pipelines.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP server binds to.
    pub bind_addr: String,

    /// Directory holding the embedded warehouse tables.
    pub data_dir: PathBuf,

    /// Directory uploaded files are persisted into before ingestion.
    pub upload_dir: PathBuf,

    /// Row cap applied to every query result set.
    pub max_result_rows: usize,

    pub llm: LlmConfig,
    pub fetch: FetchConfig,
}

/// LLM completion endpoint settings (OpenAI-compatible chat completions).
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

/// Retry policy for the source-fetching HTTP client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Total GET attempts per request.
    pub retries: u32,
    /// Initial backoff; doubles after each failed attempt.
    pub backoff: Duration,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            retries: 3,
            backoff: Duration::from_millis(500),
            timeout: Duration::from_secs(15),
        }
    }
}

impl Config {
    /// Build configuration from the environment, with sensible defaults for
    /// local development. The LLM key falls back to the offline canned-response
    /// mode when unset.
    pub fn from_env() -> Self {
        let env = |key: &str, default: &str| {
            std::env::var(key).unwrap_or_else(|_| default.to_string())
        };

        Self {
            bind_addr: env("DATADOCK_BIND", "0.0.0.0:8080"),
            data_dir: PathBuf::from(env("DATADOCK_DATA_DIR", "data")),
            upload_dir: PathBuf::from(env("DATADOCK_UPLOAD_DIR", "uploads")),
            max_result_rows: 1000,
            llm: LlmConfig {
                api_key: env("OPENAI_API_KEY", "dummy-api-key"),
                model: env("OPENAI_MODEL", "gpt-4"),
                base_url: env("OPENAI_BASE_URL", "https://api.openai.com/v1"),
            },
            fetch: FetchConfig::default(),
        }
    }
}
