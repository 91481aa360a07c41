//! Policy Engine port (§4.7).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::entities::{ServerConfig, ToolDescriptor};
use crate::value_objects::Intent;

/// The terminal verdict of a policy evaluation (§4.7).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum PolicyVerdict {
    /// Allowed unconditionally.
    Allow,
    /// Allowed, but a warning should be surfaced to the caller.
    AllowWithWarning {
        /// The warning text.
        warning: String,
    },
    /// Blocked outright.
    Deny {
        /// Why the call was denied.
        reason: String,
    },
    /// Requires explicit confirmation the caller has not yet given.
    Ask {
        /// What confirmation is being requested.
        prompt: String,
    },
}

impl PolicyVerdict {
    /// Whether this verdict permits dispatch to proceed.
    #[must_use]
    pub fn permits_dispatch(&self) -> bool {
        matches!(self, PolicyVerdict::Allow | PolicyVerdict::AllowWithWarning { .. })
    }
}

/// Everything the Policy Engine needs to evaluate one call (§4.7 Inputs).
#[derive(Debug, Clone)]
pub struct PolicyRequest<'a> {
    /// Configuration of the target server.
    pub server_config: &'a ServerConfig,
    /// Descriptor of the target tool.
    pub tool: &'a ToolDescriptor,
    /// Agent-declared intent, if any.
    pub intent: Option<&'a Intent>,
    /// The call's arguments, available for argument-shape rules.
    pub arguments: &'a serde_json::Value,
    /// Where the call originated (`mcp`, `cli`, `api`).
    pub source: &'a str,
}

/// The full decision returned by a policy evaluation: the verdict plus
/// an optional argument rewrite (§4.7 Output).
#[derive(Debug, Clone)]
pub struct PolicyDecision {
    /// The terminal verdict.
    pub verdict: PolicyVerdict,
    /// Rewritten arguments, if the matching rule rewrote them.
    pub rewritten_arguments: Option<serde_json::Value>,
}

/// Evaluates tool invocations against allow/deny rules and intent
/// (§4.7). Stateless over an immutable rule set reloaded on config
/// change (§3 ownership summary).
#[async_trait]
pub trait PolicyEngine: Send + Sync {
    /// Evaluates one call and returns a decision. Quarantine and
    /// `disabled` are short-circuit denies evaluated before any user
    /// rule (§4.7).
    async fn evaluate(&self, request: PolicyRequest<'_>) -> PolicyDecision;
}
