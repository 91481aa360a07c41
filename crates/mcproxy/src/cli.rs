//! Command-line surface for the `mcproxyd` daemon binary.

use std::path::PathBuf;

use clap::Parser;

/// The MCP smart proxy daemon: manages upstream MCP servers and
/// exposes a single aggregate MCP/REST/SSE surface to agents.
#[derive(Debug, Parser)]
#[command(name = "mcproxyd")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Directory holding the persistent store, logs, config file and
    /// control socket. Defaults to the platform data directory.
    #[arg(long, env = "MCPROXY_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Path to `mcp_config.json`. Defaults to `<data_dir>/mcp_config.json`.
    #[arg(long, env = "MCPROXY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Additional `host:port` to bind the Control Surface to, beyond
    /// the always-on Unix-domain socket (§6).
    #[arg(long, env = "MCPROXY_LISTEN")]
    pub listen: Option<String>,

    /// Keep logging to stderr even if `logging.stderr` in the config
    /// file says otherwise; convenient when not daemonized.
    #[arg(long)]
    pub foreground: bool,
}

impl Cli {
    /// The resolved data directory: the flag/env value if given,
    /// otherwise the platform data dir joined with `mcproxy`.
    #[must_use]
    pub fn resolved_data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("mcproxy")
        })
    }
}
