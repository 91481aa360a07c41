//! Agent-declared intent (§3 `Intent`).

use serde::{Deserialize, Serialize};

/// Classification of the kind of operation a tool call performs.
///
/// Declared by the agent, either via an intent-variant tool name
/// (`call_tool_read` / `_write` / `_destructive`) or an explicit
/// `intent` field on the request. The Policy Engine may require this
/// for anything other than `Read`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    /// Read-only operation; never requires confirmation.
    Read,
    /// Mutating but recoverable operation.
    Write,
    /// Destructive, possibly irreversible operation.
    Destructive,
}

impl OperationType {
    /// Parses the `call_tool_{read|write|destructive}` variant suffix.
    #[must_use]
    pub fn from_variant_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "read" => Some(Self::Read),
            "write" => Some(Self::Write),
            "destructive" => Some(Self::Destructive),
            _ => None,
        }
    }
}

/// Agent-declared intent attached to a tool invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intent {
    /// What kind of operation this is.
    pub operation_type: OperationType,
    /// Optional classification of how sensitive the data touched is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_sensitivity: Option<String>,
    /// Optional free-text reason the agent is making this call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Whether the agent believes the operation is reversible.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reversible: Option<bool>,
}

impl Intent {
    /// Builds the minimal intent for a given operation type.
    #[must_use]
    pub fn of(operation_type: OperationType) -> Self {
        Self {
            operation_type,
            data_sensitivity: None,
            reason: None,
            reversible: None,
        }
    }
}
