//! TOML configuration file loading
//!
//! Supports `~/.config/voice-agent/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    /// Upstream origins for the routing table
    #[serde(default)]
    pub origins: OriginsFileConfig,

    /// Chat client settings
    #[serde(default)]
    pub client: ClientFileConfig,

    /// Forwarding proxy settings
    #[serde(default)]
    pub proxy: ProxyFileConfig,
}

/// Upstream origins
#[derive(Debug, Default, Deserialize)]
pub struct OriginsFileConfig {
    /// STT/TTS backend origin (e.g. "http://localhost:8000")
    pub backend: Option<String>,

    /// Workflow engine origin (e.g. "http://localhost:5678")
    pub workflow: Option<String>,
}

/// Chat client configuration
#[derive(Debug, Default, Deserialize)]
pub struct ClientFileConfig {
    /// Route every call through a proxy at this base URL
    pub api_base: Option<String>,

    /// Append STT transcripts to this file
    pub transcript_log: Option<PathBuf>,

    /// Play synthesized replies on the default output device
    pub playback: Option<bool>,
}

/// Proxy server configuration
#[derive(Debug, Default, Deserialize)]
pub struct ProxyFileConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Parse a config file from a path
///
/// # Errors
///
/// Returns error if the file cannot be read or is not valid TOML
pub fn read_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Load the TOML config file from the standard path
///
/// Returns `ConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> ConfigFile {
    let Some(path) = config_file_path() else {
        return ConfigFile::default();
    };

    if !path.exists() {
        return ConfigFile::default();
    }

    match read_config_file(&path) {
        Ok(config) => {
            tracing::info!(path = %path.display(), "loaded config file");
            config
        }
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to load config file, using defaults"
            );
            ConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/voice-agent/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("voice-agent").join("config.toml"))
}
