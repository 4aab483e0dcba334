//! Layered configuration for the panel server.
//!
//! Values come from `triage.toml` when present, then environment
//! variables, then CLI flags; later layers win.
//!
//! ```toml
//! [server]
//! port = 9100
//! host = "127.0.0.1"
//! dev_mode = false
//! seed_demo = true
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::server::ServerConfig;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TriageConfig {
    #[serde(default)]
    pub server: ServerSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub port: u16,
    /// Bind address; absent means loopback, or all interfaces in dev mode.
    pub host: Option<String>,
    pub dev_mode: bool,
    pub seed_demo: bool,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            port: 9100,
            host: None,
            dev_mode: false,
            seed_demo: false,
        }
    }
}

impl TriageConfig {
    /// Load from a config file, or defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Apply environment and CLI overrides and produce the runtime server
    /// config.
    pub fn resolve(
        mut self,
        cli_port: Option<u16>,
        cli_host: Option<String>,
        cli_dev: bool,
        cli_seed: bool,
    ) -> ServerConfig {
        if let Some(port) = std::env::var("TRIAGE_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            self.server.port = port;
        }
        if let Some(port) = cli_port {
            self.server.port = port;
        }
        if let Ok(host) = std::env::var("TRIAGE_HOST") {
            self.server.host = Some(host);
        }
        if cli_host.is_some() {
            self.server.host = cli_host;
        }
        ServerConfig {
            port: self.server.port,
            host: self.server.host,
            dev_mode: self.server.dev_mode || cli_dev,
            seed_demo: self.server.seed_demo || cli_seed,
        }
    }
}
