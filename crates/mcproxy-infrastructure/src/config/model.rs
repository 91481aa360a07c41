//! The on-disk shape of `mcp_config.json` (§6).

use std::path::PathBuf;

use mcproxy_domain::entities::ServerConfig;
use serde::{Deserialize, Serialize};

fn default_tool_response_limit() -> usize {
    50_000
}

fn default_true() -> bool {
    true
}

/// Logging settings, the `logging` block of `mcp_config.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter`-compatible directive, e.g. `"info"`.
    pub level: String,
    /// Directory per-server and daemon log files are written to.
    /// Defaults to `<data_dir>/logs`.
    pub dir: Option<PathBuf>,
    /// Whether to additionally log to stderr (useful when not daemonized).
    pub stderr: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            dir: None,
            stderr: true,
        }
    }
}

/// The full daemon configuration, deserialized from `mcp_config.json`
/// (§6). Unknown fields are ignored for forward compatibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Optional `host:port` to additionally bind the Control Surface to.
    #[serde(default)]
    pub listen: Option<String>,
    /// Directory holding the persistent store, logs and the control socket.
    pub data_dir: PathBuf,
    /// API key required on every request but `/events?apikey=`.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Upper bound, in bytes, on a tool call's response body (§4.8 step 6).
    #[serde(default = "default_tool_response_limit")]
    pub tool_response_limit: usize,
    /// Whether the `/code/exec` sandbox endpoint is enabled at all.
    #[serde(default = "default_true")]
    pub enable_code_execution: bool,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// The configured upstream servers.
    #[serde(default, rename = "mcpServers")]
    pub mcp_servers: Vec<ServerConfig>,
}

impl DaemonConfig {
    /// A minimal configuration rooted at `data_dir`, with no servers
    /// configured yet — used for first-run bootstrap.
    #[must_use]
    pub fn new_default(data_dir: PathBuf) -> Self {
        Self {
            listen: None,
            data_dir,
            api_key: None,
            tool_response_limit: default_tool_response_limit(),
            enable_code_execution: true,
            logging: LoggingConfig::default(),
            mcp_servers: Vec::new(),
        }
    }

    /// The resolved log directory, defaulting to `<data_dir>/logs`.
    #[must_use]
    pub fn log_dir(&self) -> PathBuf {
        self.logging
            .dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("logs"))
    }

    /// Path to the control socket (§4.11, §6).
    #[must_use]
    pub fn socket_path(&self) -> PathBuf {
        self.data_dir.join("mcpproxy.sock")
    }
}
