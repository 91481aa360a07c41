//! `POST /api/v1/hooks/evaluate` (§6): lets an external agent harness
//! (e.g. a `PreToolUse`/`PostToolUse` hook) ask the Policy Engine what
//! it would decide, without actually dispatching the call.

use axum::extract::State;
use axum::Json;
use mcproxy_domain::ports::{PolicyDecision, PolicyRequest, PolicyVerdict};
use mcproxy_domain::value_objects::Intent;
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookEvent {
    PreToolUse,
    PostToolUse,
}

#[derive(Debug, Deserialize)]
pub struct HookEvaluateRequest {
    pub event: HookEvent,
    /// Qualified `server:tool` name.
    pub name: String,
    #[serde(default)]
    pub args: serde_json::Value,
    #[serde(default)]
    pub intent: Option<Intent>,
}

#[derive(Debug, Serialize)]
pub struct HookEvaluateResponse {
    pub verdict: PolicyVerdict,
    pub rewritten_arguments: Option<serde_json::Value>,
}

/// `PostToolUse` is informational only: the call already happened, so
/// the verdict is always `Allow` and exists only so callers can use
/// one request shape for both events.
pub async fn evaluate(State(state): State<AppState>, Json(body): Json<HookEvaluateRequest>) -> ApiResult<Json<HookEvaluateResponse>> {
    if matches!(body.event, HookEvent::PostToolUse) {
        return Ok(Json(HookEvaluateResponse {
            verdict: PolicyVerdict::Allow,
            rewritten_arguments: None,
        }));
    }

    let (server, tool) = body
        .name
        .split_once(':')
        .map(|(s, t)| (s.to_owned(), t.to_owned()))
        .ok_or_else(|| mcproxy_domain::Error::InvalidArgument {
            message: format!("'{}' is not a qualified 'server:tool' name", body.name),
        })?;

    let (server_config, descriptor) = state.upstream.resolve_tool(&server, &tool).await?;
    let decision: PolicyDecision = state
        .policy
        .evaluate(PolicyRequest {
            server_config: &server_config,
            tool: &descriptor,
            intent: body.intent.as_ref(),
            arguments: &body.args,
            source: "hook",
        })
        .await;

    Ok(Json(HookEvaluateResponse {
        verdict: decision.verdict,
        rewritten_arguments: decision.rewritten_arguments,
    }))
}
