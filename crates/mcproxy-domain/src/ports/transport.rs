//! Upstream transport capability (§4.3, §9 "Dynamic dispatch over
//! heterogeneous transports").

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::entities::ToolDescriptor;
use crate::error::Result;
use crate::value_objects::{Intent, ServerIdentity};

/// Result of one `CallTool` invocation against an upstream.
#[derive(Debug, Clone)]
pub struct ToolCallOutcome {
    /// Raw JSON result payload returned by the upstream.
    pub result: serde_json::Value,
    /// Whether the upstream itself reported this as an error result.
    pub is_error: bool,
}

/// The capability every transport variant (stdio / http / sse /
/// streamable-http) implements. An [`crate::ports::UpstreamClient`]
/// holds exactly one value of this trait (§9).
#[async_trait]
pub trait UpstreamTransport: Send + Sync {
    /// Performs the MCP `initialize` handshake. Idempotent: concurrent
    /// callers must coalesce to a single in-flight attempt.
    async fn connect(&self, cancel: CancellationToken) -> Result<()>;

    /// Lists the tools the upstream currently offers.
    async fn list_tools(&self, server_id: &ServerIdentity) -> Result<Vec<ToolDescriptor>>;

    /// Invokes one tool by its upstream-local name.
    async fn call_tool(
        &self,
        tool_name: &str,
        args: serde_json::Value,
        intent: Option<&Intent>,
        cancel: CancellationToken,
    ) -> Result<ToolCallOutcome>;

    /// Drains in-flight calls up to a grace deadline, then force-closes.
    async fn close(&self, grace: std::time::Duration);
}
