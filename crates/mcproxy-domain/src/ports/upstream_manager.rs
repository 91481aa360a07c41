//! Upstream Manager port (§4.4): the registry of live Upstream Clients.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::entities::{ServerConfig, ToolDescriptor, UpstreamState};
use crate::error::Result;
use crate::ports::transport::ToolCallOutcome;
use crate::value_objects::{Intent, ServerIdentity};

/// One line of a per-server log file (§4.3 "Writes a per-server
/// append-only log file").
#[derive(Debug, Clone, serde::Serialize)]
pub struct LogLine {
    /// When the line was written.
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Log level as reported by the subprocess/transport.
    pub level: String,
    /// The line content.
    pub message: String,
}

/// Administrative state independent of connection health (§6 `admin_state`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminState {
    /// Allowed to connect and serve calls.
    Enabled,
    /// Explicitly turned off; no auto-reconnect.
    Disabled,
    /// Administratively quarantined.
    Quarantined,
}

/// Unified health snapshot for one server, as surfaced by `GET /servers` (§6).
#[derive(Debug, Clone, serde::Serialize)]
pub struct ServerStatus {
    /// Stable identity.
    pub server_id: ServerIdentity,
    /// Declarative configuration as currently reconciled.
    pub config: ServerConfig,
    /// Live connection state.
    pub state: UpstreamState,
    /// Administrative state.
    pub admin_state: AdminState,
    /// Number of tools currently indexed for this server.
    pub tool_count: usize,
}

/// Per-server outcome of a bulk operation (§4.4, §6).
#[derive(Debug, Clone, serde::Serialize)]
pub struct BulkOutcome {
    /// Servers targeted.
    pub total: usize,
    /// Servers that succeeded.
    pub successful: usize,
    /// Servers that failed.
    pub failed: usize,
    /// Per-server failure messages, keyed by server name.
    pub errors: std::collections::HashMap<String, String>,
}

/// Owns `server_id -> UpstreamClient` and exposes the lifecycle
/// operations of §4.4. Implementations serialize per-server operations
/// through that server's own mailbox (§5).
#[async_trait]
pub trait UpstreamManager: Send + Sync {
    /// Resolves a `(server_name, tool_name)` pair to its current
    /// config and descriptor, for the Dispatch Engine's classify step.
    async fn resolve_tool(
        &self,
        server_name: &str,
        tool_name: &str,
    ) -> Result<(ServerConfig, ToolDescriptor)>;

    /// Invokes a tool on the named server's live client.
    async fn call_tool(
        &self,
        server_name: &str,
        tool_name: &str,
        args: serde_json::Value,
        intent: Option<&Intent>,
        cancel: CancellationToken,
    ) -> Result<ToolCallOutcome>;

    /// Registers a new server and begins connecting it.
    async fn add(&self, config: ServerConfig) -> Result<ServerIdentity>;

    /// Removes a server, tearing down its client.
    async fn remove(&self, name: &str) -> Result<()>;

    /// Restarts one server, or every server if `name` is `None`.
    async fn restart(&self, name: Option<&str>) -> Result<BulkOutcome>;

    /// Enables one server, or every server if `name` is `None`.
    async fn enable(&self, name: Option<&str>) -> Result<BulkOutcome>;

    /// Disables one server, or every server if `name` is `None`.
    async fn disable(&self, name: Option<&str>) -> Result<BulkOutcome>;

    /// Sets or clears quarantine on one server.
    async fn quarantine(&self, name: &str, on: bool) -> Result<()>;

    /// Initiates the OAuth flow for a server in `AuthRequired`,
    /// returning the URL the user should visit.
    async fn trigger_oauth(&self, name: &str) -> Result<String>;

    /// Current status of every registered server.
    async fn list(&self) -> Vec<ServerStatus>;

    /// Status of a single server.
    async fn get(&self, name: &str) -> Result<ServerStatus>;

    /// Tails the per-server log file.
    async fn logs(&self, name: &str, tail: usize) -> Result<Vec<LogLine>>;
}
