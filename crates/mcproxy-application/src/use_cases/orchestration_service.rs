//! Orchestration Sandbox Adapter (§4.9): the `call_tool` primitive
//! exposed to a sandboxed JavaScript orchestration script. Never lets
//! an error cross the sandbox boundary as an exception — every call
//! resolves to a structured `{ok, result|error}` value instead.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mcproxy_domain::entities::ActivitySource;
use mcproxy_domain::value_objects::{ActivityId, SessionId};
use tokio_util::sync::CancellationToken;

use crate::use_cases::dispatch_service::{DispatchEngine, DispatchRequest};

/// Per-script limits enforced by the adapter (§4.9).
#[derive(Debug, Clone)]
pub struct OrchestrationLimits {
    /// Hard cap on the number of `call_tool` invocations one script run may make.
    pub max_tool_calls: usize,
    /// Timeout applied to each individual call.
    pub call_timeout: Duration,
    /// If set, only these server names may be called.
    pub allowed_servers: Option<Vec<String>>,
}

impl Default for OrchestrationLimits {
    fn default() -> Self {
        Self {
            max_tool_calls: 32,
            call_timeout: Duration::from_secs(30),
            allowed_servers: None,
        }
    }
}

/// The `{ok, result|error}` envelope returned to the script (§4.9).
#[derive(Debug, Clone, serde::Serialize)]
pub struct SandboxResult {
    /// Whether the call succeeded.
    pub ok: bool,
    /// The tool's result, present iff `ok`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// A human-readable error, present iff not `ok`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SandboxResult {
    fn ok(result: serde_json::Value) -> Self {
        Self {
            ok: true,
            result: Some(result),
            error: None,
        }
    }

    fn err(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            result: None,
            error: Some(message.into()),
        }
    }
}

/// One orchestrator script's view of the proxy: a `call_tool` bound to
/// the script's parent activity, session and limits.
///
/// A new session is created per script execution so `calls_made`
/// starts at zero each run.
pub struct OrchestrationSession {
    dispatch: Arc<DispatchEngine>,
    parent_id: ActivityId,
    session_id: Option<SessionId>,
    source: ActivitySource,
    limits: OrchestrationLimits,
    calls_made: AtomicUsize,
}

impl OrchestrationSession {
    /// Starts a new sandboxed session nested under `parent_id`.
    #[must_use]
    pub fn new(
        dispatch: Arc<DispatchEngine>,
        parent_id: ActivityId,
        session_id: Option<SessionId>,
        source: ActivitySource,
        limits: OrchestrationLimits,
    ) -> Self {
        Self {
            dispatch,
            parent_id,
            session_id,
            source,
            limits,
            calls_made: AtomicUsize::new(0),
        }
    }

    /// The primitive exposed to the script. Infallible by design: every
    /// failure mode (limit exceeded, disallowed server, policy denial,
    /// upstream error, timeout) is reported in the returned envelope,
    /// never as a propagated error.
    pub async fn call_tool(&self, server: &str, tool: &str, args: serde_json::Value) -> SandboxResult {
        let made = self.calls_made.fetch_add(1, Ordering::SeqCst) + 1;
        if made > self.limits.max_tool_calls {
            return SandboxResult::err(format!(
                "max_tool_calls ({}) exceeded",
                self.limits.max_tool_calls
            ));
        }

        if let Some(allowed) = &self.limits.allowed_servers {
            if !allowed.iter().any(|s| s == server) {
                return SandboxResult::err(format!("server '{server}' is not in the orchestrator allow-list"));
            }
        }

        let request = DispatchRequest {
            name: format!("{server}:{tool}"),
            args,
            intent: None,
            source: self.source,
            session_id: self.session_id.clone(),
            parent_id: Some(self.parent_id.clone()),
            deadline: Some(self.limits.call_timeout),
        };

        let cancel = CancellationToken::new();
        match tokio::time::timeout(self.limits.call_timeout, self.dispatch.call(request, cancel)).await {
            Ok(Ok(response)) => SandboxResult::ok(response.result),
            Ok(Err(err)) => SandboxResult::err(err.to_string()),
            Err(_) => SandboxResult::err(format!("call timed out after {:?}", self.limits.call_timeout)),
        }
    }

    /// Number of calls made so far in this session.
    #[must_use]
    pub fn calls_made(&self) -> usize {
        self.calls_made.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sandbox_result_error_omits_result_field() {
        let r = SandboxResult::err("boom");
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["ok"], false);
        assert_eq!(v["error"], "boom");
        assert!(v.get("result").is_none());
    }

    #[test]
    fn sandbox_result_ok_omits_error_field() {
        let r = SandboxResult::ok(serde_json::json!({"x": 1}));
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["ok"], true);
        assert!(v.get("error").is_none());
    }
}
