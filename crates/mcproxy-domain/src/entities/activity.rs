//! [`ActivityRecord`] (§3): the append-only audit trail entry.

use serde::{Deserialize, Serialize};

use crate::value_objects::{ActivityId, Intent, RequestId, SessionId};

/// The five categories of observable event (§6, GLOSSARY).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    /// A tool call made by an external agent.
    ToolCall,
    /// A tool call nested inside an orchestrator script.
    InternalToolCall,
    /// A policy engine decision.
    PolicyDecision,
    /// Daemon startup.
    SystemStart,
    /// Daemon shutdown.
    SystemStop,
    /// A configuration mutation.
    ConfigChange,
    /// A server lifecycle transition (connect/restart/quarantine/...).
    ServerChange,
    /// An SSE subscriber was evicted for falling behind (§5 backpressure).
    SlowConsumer,
}

impl ActivityType {
    /// The SSE `event:` category fragment for this type.
    #[must_use]
    pub fn category(self) -> &'static str {
        match self {
            ActivityType::ToolCall => "tool_call",
            ActivityType::InternalToolCall => "internal_tool_call",
            ActivityType::PolicyDecision => "policy_decision",
            ActivityType::SystemStart => "system_start",
            ActivityType::SystemStop => "system_stop",
            ActivityType::ConfigChange => "config_change",
            ActivityType::ServerChange => "server_change",
            ActivityType::SlowConsumer => "slow_consumer",
        }
    }
}

/// Who originated the call chain this record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivitySource {
    /// An external MCP agent.
    Mcp,
    /// The CLI.
    Cli,
    /// The REST API.
    Api,
}

/// Outcome of a call or decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityStatus {
    /// In flight; only valid for the `.started` phase.
    Started,
    /// Completed successfully.
    Success,
    /// Completed with an error.
    Error,
    /// Blocked by policy before dispatch.
    Blocked,
}

impl ActivityStatus {
    /// The wire-stable lowercase name for this status, used as a
    /// grouping key in `/activity/summary?by=status` (§4.6).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ActivityStatus::Started => "started",
            ActivityStatus::Success => "success",
            ActivityStatus::Error => "error",
            ActivityStatus::Blocked => "blocked",
        }
    }
}

/// One append-only audit entry (§3 `ActivityRecord`).
///
/// Once written, immutable. Total order across a bus instance is by
/// [`ActivityId`] (§3 invariant, §8 property 2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityRecord {
    /// Sortable, unique id.
    pub id: ActivityId,
    /// Which of the five-plus categories this is.
    #[serde(rename = "type")]
    pub activity_type: ActivityType,
    /// Who originated the call.
    pub source: ActivitySource,
    /// Server this activity concerns, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,
    /// Tool this activity concerns, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    /// Outcome of the call.
    pub status: ActivityStatus,
    /// Wall-clock duration, populated on the terminal record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// When this record was published.
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Correlation: client-supplied session, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    /// Correlation: per-call request id.
    pub request_id: RequestId,
    /// Correlation: parent activity id, forming a forest (§9).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<ActivityId>,
    /// Call arguments, if this is a tool-call-shaped record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<serde_json::Value>,
    /// Call response, possibly truncated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<serde_json::Value>,
    /// Whether `response` was cut down by the truncator.
    #[serde(default)]
    pub response_truncated: bool,
    /// Error message, if `status == Error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Declared intent, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<Intent>,
    /// Free-form extra metadata (e.g. `slow_consumer` reason).
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl ActivityRecord {
    /// Whether this record is a terminal (non-`started`) record.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self.status, ActivityStatus::Started)
    }
}
