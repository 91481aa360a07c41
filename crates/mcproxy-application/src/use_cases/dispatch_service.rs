//! Dispatch Engine (§4.8): the hot path every tool call flows through,
//! whether it came from an external MCP agent, the CLI, or the
//! JavaScript orchestrator.

use std::sync::Arc;
use std::time::Duration;

use mcproxy_domain::entities::{ActivityRecord, ActivitySource, ActivityStatus, ActivityType};
use mcproxy_domain::error::{Error, Result};
use mcproxy_domain::ports::{ActivityBus, PolicyEngine, PolicyRequest, PolicyVerdict, UpstreamManager};
use mcproxy_domain::value_objects::{ActivityId, Intent, OperationType, RequestId, SessionId};
use tokio_util::sync::CancellationToken;

/// A call bound for the Dispatch Engine, already classified into a
/// single target name (`server:tool`).
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    /// The raw tool name as received, e.g. `"gh:delete_repo"` or
    /// `"call_tool_destructive"`.
    pub name: String,
    /// Call arguments.
    pub args: serde_json::Value,
    /// Explicit intent field, if the caller supplied one directly.
    pub intent: Option<Intent>,
    /// Who originated this call.
    pub source: ActivitySource,
    /// Caller-supplied session id, if any.
    pub session_id: Option<SessionId>,
    /// Parent activity id, if this call is nested (orchestrator).
    pub parent_id: Option<ActivityId>,
    /// Caller's own deadline, if any; combined with the per-server cap.
    pub deadline: Option<Duration>,
}

/// Result of one dispatched call.
#[derive(Debug, Clone)]
pub struct DispatchResponse {
    /// The (possibly truncated) result payload.
    pub result: serde_json::Value,
    /// Whether the upstream itself reported an error.
    pub is_error: bool,
    /// Whether `result` was cut down by the truncator.
    pub truncated: bool,
    /// The request id this call was recorded under, for caller correlation.
    pub request_id: RequestId,
    /// The id of the terminal (`.completed`) activity record.
    pub activity_id: ActivityId,
}

/// One classified call target.
struct Classified {
    server: String,
    tool: String,
    args: serde_json::Value,
    intent: Option<Intent>,
}

/// Splits `"server:tool"` into its parts, or unwraps an intent-variant
/// built-in (`call_tool_read` / `_write` / `_destructive`) whose
/// arguments carry `{name, args, intent?}` (§4.8 step 1, §8 scenario 2).
fn classify(name: &str, args: serde_json::Value) -> Result<Classified> {
    if let Some(suffix) = name.strip_prefix("call_tool_") {
        let operation_type = OperationType::from_variant_suffix(suffix).ok_or_else(|| {
            Error::InvalidArgument {
                message: format!("unknown intent variant tool '{name}'"),
            }
        })?;
        let target = args.get("name").and_then(|v| v.as_str()).ok_or_else(|| {
            Error::InvalidArgument {
                message: "intent-variant calls require a 'name' field".to_owned(),
            }
        })?;
        let inner_args = args.get("args").cloned().unwrap_or(serde_json::json!({}));
        let (server, tool) = split_target(target)?;
        return Ok(Classified {
            server,
            tool,
            args: inner_args,
            intent: Some(Intent::of(operation_type)),
        });
    }

    let (server, tool) = split_target(name)?;
    Ok(Classified {
        server,
        tool,
        args,
        intent: None,
    })
}

fn split_target(name: &str) -> Result<(String, String)> {
    name.split_once(':')
        .map(|(s, t)| (s.to_owned(), t.to_owned()))
        .ok_or_else(|| Error::InvalidArgument {
            message: format!("'{name}' is not a qualified 'server:tool' name"),
        })
}

/// Truncates `value` to at most `limit` bytes, cutting only at a UTF-8
/// character boundary. Idempotent: a value already within `limit`
/// passes through unchanged (§8 invariant 4).
#[must_use]
pub fn truncate_response(value: serde_json::Value, limit: usize) -> (serde_json::Value, bool) {
    let text = match &value {
        serde_json::Value::String(s) => s.clone(),
        other => serde_json::to_string(other).unwrap_or_default(),
    };
    if text.len() <= limit {
        return (value, false);
    }
    let mut end = limit;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    (serde_json::Value::String(text[..end].to_owned()), true)
}

/// The dispatch pipeline (§4.8).
pub struct DispatchEngine {
    upstream: Arc<dyn UpstreamManager>,
    policy: Arc<dyn PolicyEngine>,
    bus: Arc<dyn ActivityBus>,
    tool_response_limit: usize,
    per_server_timeout: Duration,
}

impl DispatchEngine {
    /// Builds a dispatch engine over its three collaborators.
    #[must_use]
    pub fn new(
        upstream: Arc<dyn UpstreamManager>,
        policy: Arc<dyn PolicyEngine>,
        bus: Arc<dyn ActivityBus>,
        tool_response_limit: usize,
        per_server_timeout: Duration,
    ) -> Self {
        Self {
            upstream,
            policy,
            bus,
            tool_response_limit,
            per_server_timeout,
        }
    }

    /// Runs one call through the full pipeline: classify, correlate,
    /// publish `.started`, policy check, dispatch, truncate, publish
    /// `.completed`, return (§4.8).
    pub async fn call(&self, request: DispatchRequest, cancel: CancellationToken) -> Result<DispatchResponse> {
        let request_id = RequestId::new();
        let activity_type = if request.parent_id.is_some() {
            ActivityType::InternalToolCall
        } else {
            ActivityType::ToolCall
        };

        let classified = match classify(&request.name, request.args.clone()) {
            Ok(c) => c,
            Err(err) => return Err(err),
        };
        let intent = classified.intent.clone().or_else(|| request.intent.clone());

        let started_at = chrono::Utc::now();
        let start_instant = std::time::Instant::now();

        let started = self
            .bus
            .publish(ActivityRecord {
                id: ActivityId::new(0, 0), // assigned by the bus on publish
                activity_type,
                source: request.source,
                server_name: Some(classified.server.clone()),
                tool_name: Some(classified.tool.clone()),
                status: ActivityStatus::Started,
                duration_ms: None,
                timestamp: started_at,
                session_id: request.session_id.clone(),
                request_id: request_id.clone(),
                parent_id: request.parent_id.clone(),
                arguments: Some(classified.args.clone()),
                response: None,
                response_truncated: false,
                error_message: None,
                intent: intent.clone(),
                metadata: serde_json::Map::new(),
            })
            .await?;

        let (server_config, tool) = match self.upstream.resolve_tool(&classified.server, &classified.tool).await {
            Ok(pair) => pair,
            Err(err) => {
                self.publish_blocked(activity_type, &request, &classified, &request_id, Some(started.id.clone()), &err.to_string())
                    .await?;
                return Err(err);
            }
        };

        let decision = self
            .policy
            .evaluate(PolicyRequest {
                server_config: &server_config,
                tool: &tool,
                intent: intent.as_ref(),
                arguments: &classified.args,
                source: match request.source {
                    ActivitySource::Mcp => "mcp",
                    ActivitySource::Cli => "cli",
                    ActivitySource::Api => "api",
                },
            })
            .await;

        self.bus
            .publish(ActivityRecord {
                id: ActivityId::new(0, 0),
                activity_type: ActivityType::PolicyDecision,
                source: request.source,
                server_name: Some(classified.server.clone()),
                tool_name: Some(classified.tool.clone()),
                status: ActivityStatus::Success,
                duration_ms: None,
                timestamp: chrono::Utc::now(),
                session_id: request.session_id.clone(),
                request_id: request_id.clone(),
                parent_id: Some(started.id.clone()),
                arguments: None,
                response: serde_json::to_value(&decision.verdict).ok(),
                response_truncated: false,
                error_message: None,
                intent: intent.clone(),
                metadata: serde_json::Map::new(),
            })
            .await?;

        if !decision.verdict.permits_dispatch() {
            let reason = match &decision.verdict {
                PolicyVerdict::Deny { reason } => reason.clone(),
                PolicyVerdict::Ask { prompt } => format!("confirmation required: {prompt}"),
                _ => "blocked".to_owned(),
            };
            self.publish_blocked(activity_type, &request, &classified, &request_id, Some(started.id.clone()), &reason)
                .await?;
            return Err(Error::PolicyDenied { reason });
        }

        let args = decision.rewritten_arguments.unwrap_or(classified.args);
        let timeout = match request.deadline {
            Some(d) if d < self.per_server_timeout => d,
            _ => self.per_server_timeout,
        };

        let outcome = tokio::time::timeout(
            timeout,
            self.upstream
                .call_tool(&classified.server, &classified.tool, args.clone(), intent.as_ref(), cancel.clone()),
        )
        .await;

        let (result, is_error, error_message) = match outcome {
            Ok(Ok(outcome)) => (outcome.result, outcome.is_error, None),
            Ok(Err(err)) => (serde_json::Value::Null, true, Some(err.to_string())),
            Err(_) => (
                serde_json::Value::Null,
                true,
                Some(Error::Timeout(timeout).to_string()),
            ),
        };

        let (truncated_result, truncated) = truncate_response(result, self.tool_response_limit);
        let status = if is_error {
            ActivityStatus::Error
        } else {
            ActivityStatus::Success
        };
        let duration_ms = start_instant.elapsed().as_millis() as u64;

        let completed = self
            .bus
            .publish(ActivityRecord {
                id: ActivityId::new(0, 0),
                activity_type,
                source: request.source,
                server_name: Some(classified.server.clone()),
                tool_name: Some(classified.tool.clone()),
                status,
                duration_ms: Some(duration_ms),
                timestamp: chrono::Utc::now(),
                session_id: request.session_id.clone(),
                request_id: request_id.clone(),
                parent_id: Some(started.id.clone()),
                arguments: None,
                response: Some(truncated_result.clone()),
                response_truncated: truncated,
                error_message: error_message.clone(),
                intent,
                metadata: serde_json::Map::new(),
            })
            .await?;

        if let Some(message) = error_message {
            return Err(Error::UpstreamError {
                server: classified.server,
                message,
            });
        }

        Ok(DispatchResponse {
            result: truncated_result,
            is_error,
            truncated,
            request_id,
            activity_id: completed.id,
        })
    }

    async fn publish_blocked(
        &self,
        activity_type: ActivityType,
        request: &DispatchRequest,
        classified: &Classified,
        request_id: &RequestId,
        parent_id: Option<ActivityId>,
        reason: &str,
    ) -> Result<()> {
        self.bus
            .publish(ActivityRecord {
                id: ActivityId::new(0, 0),
                activity_type,
                source: request.source,
                server_name: Some(classified.server.clone()),
                tool_name: Some(classified.tool.clone()),
                status: ActivityStatus::Blocked,
                duration_ms: None,
                timestamp: chrono::Utc::now(),
                session_id: request.session_id.clone(),
                request_id: request_id.clone(),
                parent_id,
                arguments: None,
                response: None,
                response_truncated: false,
                error_message: Some(reason.to_owned()),
                intent: None,
                metadata: serde_json::Map::new(),
            })
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_qualified_name() {
        let c = classify("gh:delete_repo", serde_json::json!({"repo": "r"})).unwrap();
        assert_eq!(c.server, "gh");
        assert_eq!(c.tool, "delete_repo");
        assert!(c.intent.is_none());
    }

    #[test]
    fn unwraps_intent_variant() {
        let c = classify(
            "call_tool_destructive",
            serde_json::json!({"name": "gh:delete_repo", "args": {"repo": "r"}}),
        )
        .unwrap();
        assert_eq!(c.server, "gh");
        assert_eq!(c.tool, "delete_repo");
        assert_eq!(c.intent.unwrap().operation_type, OperationType::Destructive);
    }

    #[test]
    fn rejects_unqualified_name() {
        assert!(classify("delete_repo", serde_json::json!({})).is_err());
    }

    #[test]
    fn truncation_is_boundary_safe_and_idempotent() {
        let long = "é".repeat(200); // 2 bytes per char
        let (first, truncated) = truncate_response(serde_json::Value::String(long), 101);
        assert!(truncated);
        // must still be valid: every byte is part of a whole char
        let serde_json::Value::String(ref s) = first else {
            panic!("expected string")
        };
        assert!(s.len() <= 101);
        let (second, truncated_again) = truncate_response(first.clone(), 101);
        assert_eq!(first, second);
        assert!(!truncated_again);
    }

    #[test]
    fn truncation_below_limit_is_noop() {
        let short = serde_json::Value::String("hi".to_owned());
        let (value, truncated) = truncate_response(short.clone(), 1024);
        assert_eq!(value, short);
        assert!(!truncated);
    }
}
