//! Service configuration, loaded once from the environment at startup.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use tracing::warn;

const DEFAULT_BIND: &str = "0.0.0.0:10000";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP server binds to.
    pub bind_addr: SocketAddr,
    /// API key for the allocation model provider. May be empty, in which
    /// case every source call fails and allocations use the equal split.
    pub api_key: String,
    /// Chat model asked for allocation proposals.
    pub model: String,
    /// Base URL of the OpenAI-compatible provider.
    pub base_url: String,
    /// Per-request timeout for provider calls.
    pub request_timeout: Duration,
}

impl Config {
    /// Read configuration from the environment.
    ///
    /// Recognized variables: `PROGALLOC_BIND`, `OPENAI_API_KEY`,
    /// `PROGALLOC_MODEL`, `PROGALLOC_BASE_URL`, `PROGALLOC_TIMEOUT_SECS`.
    pub fn from_env() -> anyhow::Result<Self> {
        let bind = std::env::var("PROGALLOC_BIND").unwrap_or_else(|_| DEFAULT_BIND.to_string());
        let bind_addr: SocketAddr = bind
            .parse()
            .with_context(|| format!("invalid PROGALLOC_BIND '{bind}'"))?;

        let api_key = std::env::var("OPENAI_API_KEY").unwrap_or_default();
        if api_key.is_empty() {
            warn!("OPENAI_API_KEY is not set; allocations will fall back to equal splits");
        }

        let timeout_secs = match std::env::var("PROGALLOC_TIMEOUT_SECS") {
            Ok(raw) => raw
                .parse::<u64>()
                .with_context(|| format!("invalid PROGALLOC_TIMEOUT_SECS '{raw}'"))?,
            Err(_) => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Self {
            bind_addr,
            api_key,
            model: std::env::var("PROGALLOC_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            base_url: std::env::var("PROGALLOC_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            request_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND.parse().unwrap(),
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}
