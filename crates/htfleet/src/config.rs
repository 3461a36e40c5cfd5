//! CLI configuration loading and resolution.
//!
//! Layered with figment: the TOML config file is the base, `HTFLEET_*`
//! environment variables override it, and CLI flags override both.

use std::path::PathBuf;
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use htfleet_core::ManagerConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── File format ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Fleet manager URL.
    pub server: Option<String>,

    /// Accept self-signed TLS certificates.
    #[serde(default)]
    pub insecure: bool,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: None,
            insecure: false,
            timeout: default_timeout(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}

// ── Loading ─────────────────────────────────────────────────────────

/// Path of the config file: `~/.config/htfleet/config.toml` (or the
/// platform equivalent).
pub fn config_path() -> PathBuf {
    directories::ProjectDirs::from("", "", "htfleet")
        .map(|dirs| dirs.config_dir().join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("htfleet.toml"))
}

/// Load the layered configuration. A missing file is not an error.
pub fn load_config() -> Result<Config, CliError> {
    let figment = Figment::from(Serialized::defaults(Config::default()))
        .merge(Toml::file(config_path()))
        .merge(Env::prefixed("HTFLEET_").only(&["server", "insecure", "timeout"]));
    Ok(figment.extract()?)
}

/// Write a starter config file. Creates parent directories as needed.
pub fn save_config(config: &Config) -> Result<PathBuf, CliError> {
    let path = config_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let rendered = toml::to_string_pretty(config).map_err(|e| CliError::Validation {
        field: "config".into(),
        reason: e.to_string(),
    })?;
    std::fs::write(&path, rendered)?;
    Ok(path)
}

// ── Resolution ──────────────────────────────────────────────────────

/// Resolve the effective `ManagerConfig` from config file, environment,
/// and CLI flag overrides (flags win).
pub fn resolve(global: &GlobalOpts) -> Result<ManagerConfig, CliError> {
    let file = load_config()?;

    let url_str = global
        .server
        .clone()
        .or(file.server)
        .ok_or_else(|| CliError::NoServer {
            path: config_path().display().to_string(),
        })?;

    let base_url: url::Url = url_str.parse().map_err(|_| CliError::Validation {
        field: "server".into(),
        reason: format!("invalid URL: {url_str}"),
    })?;

    // The clap default for --timeout matches the file default, so a file
    // value only wins when the flag was left at its default.
    let timeout = if global.timeout == default_timeout() {
        file.timeout
    } else {
        global.timeout
    };

    Ok(ManagerConfig::new(base_url)
        .with_timeout(Duration::from_secs(timeout))
        .with_accept_invalid_certs(global.insecure || file.insecure))
}
