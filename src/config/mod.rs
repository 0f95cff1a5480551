//! Configuration management for the voice agent

pub mod file;

use std::path::PathBuf;

use crate::routes::{Endpoints, RouteTable};
use crate::{Error, Result};

pub use file::ConfigFile;

/// Default STT/TTS backend origin
pub const DEFAULT_BACKEND_ORIGIN: &str = "http://localhost:8000";

/// Default workflow engine origin
pub const DEFAULT_WORKFLOW_ORIGIN: &str = "http://localhost:5678";

/// Default proxy port
pub const DEFAULT_PROXY_PORT: u16 = 3000;

/// Voice agent configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// STT/TTS backend origin (`BACKEND_ORIGIN`)
    pub backend_origin: String,

    /// Workflow engine origin (`N8N_ORIGIN`)
    pub workflow_origin: String,

    /// Chat client configuration
    pub client: ClientConfig,

    /// Forwarding proxy configuration
    pub proxy: ProxyConfig,
}

/// Chat client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Proxy base URL; `None` calls the upstream origins directly
    pub api_base: Option<String>,

    /// File that STT transcripts are appended to
    pub transcript_log: Option<PathBuf>,

    /// Play synthesized replies
    pub playback: bool,
}

/// Forwarding proxy configuration
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub host: String,
    pub port: u16,
}

impl Config {
    /// Load configuration (env > toml > default)
    ///
    /// # Errors
    ///
    /// Returns error if an origin or the API base is not a valid URL
    pub fn load() -> Result<Self> {
        let fc = file::load_config_file();
        Self::from_sources(fc, |key| std::env::var(key).ok())
    }

    /// Build configuration from a parsed file and an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if an origin or the API base is not a valid URL, or the
    /// proxy port is not a number
    pub fn from_sources(fc: ConfigFile, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let backend_origin = env("BACKEND_ORIGIN")
            .or(fc.origins.backend)
            .unwrap_or_else(|| DEFAULT_BACKEND_ORIGIN.to_string());
        let workflow_origin = env("N8N_ORIGIN")
            .or(fc.origins.workflow)
            .unwrap_or_else(|| DEFAULT_WORKFLOW_ORIGIN.to_string());

        let api_base = env("VOICE_AGENT_API_BASE")
            .or(fc.client.api_base)
            .filter(|s| !s.trim().is_empty());

        let client = ClientConfig {
            api_base: api_base
                .map(|base| validate_url("VOICE_AGENT_API_BASE", &base))
                .transpose()?,
            transcript_log: env("VOICE_AGENT_TRANSCRIPT_LOG")
                .map(PathBuf::from)
                .or(fc.client.transcript_log),
            playback: fc.client.playback.unwrap_or(true),
        };

        let proxy = ProxyConfig {
            host: env("VOICE_AGENT_PROXY_HOST")
                .or(fc.proxy.host)
                .unwrap_or_else(|| "127.0.0.1".to_string()),
            port: env("VOICE_AGENT_PROXY_PORT")
                .map(|port| parse_port("VOICE_AGENT_PROXY_PORT", &port))
                .transpose()?
                .or(fc.proxy.port)
                .unwrap_or(DEFAULT_PROXY_PORT),
        };

        Ok(Self {
            backend_origin: validate_url("BACKEND_ORIGIN", &backend_origin)?,
            workflow_origin: validate_url("N8N_ORIGIN", &workflow_origin)?,
            client,
            proxy,
        })
    }

    /// Route client calls through a proxy at `base`
    ///
    /// # Errors
    ///
    /// Returns error if `base` is not a valid http(s) URL
    pub fn set_api_base(&mut self, base: &str) -> Result<()> {
        self.client.api_base = Some(validate_url("api base", base)?);
        Ok(())
    }

    /// Routing table bound to the configured origins
    #[must_use]
    pub fn route_table(&self) -> RouteTable {
        RouteTable::new(&self.backend_origin, &self.workflow_origin)
    }

    /// Endpoints the chat client calls
    #[must_use]
    pub fn endpoints(&self) -> Endpoints {
        match &self.client.api_base {
            Some(base) => Endpoints::via_proxy(base),
            None => Endpoints::direct(&self.route_table()),
        }
    }
}

fn parse_port(name: &str, value: &str) -> Result<u16> {
    value
        .trim()
        .parse()
        .map_err(|e| Error::Config(format!("{name} is not a valid port ({value}): {e}")))
}

/// Check that `value` is an absolute http(s) URL and strip a trailing slash
fn validate_url(name: &str, value: &str) -> Result<String> {
    let value = value.trim();
    let parsed = url::Url::parse(value)
        .map_err(|e| Error::Config(format!("{name} is not a valid URL ({value}): {e}")))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(Error::Config(format!(
            "{name} must use http or https, got {}",
            parsed.scheme()
        )));
    }

    Ok(value.trim_end_matches('/').to_string())
}
