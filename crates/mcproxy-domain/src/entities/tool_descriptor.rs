//! [`ToolDescriptor`] (§3): a tool offered by an upstream server.

use serde::{Deserialize, Serialize};

use crate::value_objects::ServerIdentity;

/// One `(server, tool, schema)` triple in the catalog.
///
/// Unique per `(server_id, tool_name)`; rebuilt whenever the owning
/// Upstream Client re-enters `Ready` (§4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Identity of the server offering this tool.
    pub server_id: ServerIdentity,
    /// Display name of the server (for `server:tool` addressing).
    pub server_name: String,
    /// Tool name as reported by the upstream.
    pub tool_name: String,
    /// JSON schema for the tool's parameters.
    pub params_schema: serde_json::Value,
    /// Human-readable description.
    pub description: String,
}

impl ToolDescriptor {
    /// The fully qualified `server:tool` address used for routing (§4.8 step 1).
    #[must_use]
    pub fn qualified_name(&self) -> String {
        format!("{}:{}", self.server_name, self.tool_name)
    }
}
