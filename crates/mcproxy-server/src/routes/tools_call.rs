//! `POST /api/v1/tools/call` (§6): the non-MCP entry point into the
//! Dispatch Engine, used by the CLI and other REST callers.

use axum::extract::State;
use axum::Json;
use mcproxy_domain::entities::ActivitySource;
use mcproxy_domain::value_objects::Intent;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ToolCallRequest {
    pub name: String,
    #[serde(default)]
    pub args: serde_json::Value,
    #[serde(default)]
    pub intent: Option<Intent>,
}

#[derive(Debug, Serialize)]
pub struct ToolCallResponse {
    pub result: serde_json::Value,
    pub is_error: bool,
    pub truncated: bool,
    pub request_id: String,
}

pub async fn call(State(state): State<AppState>, Json(body): Json<ToolCallRequest>) -> ApiResult<Json<ToolCallResponse>> {
    let request = mcproxy_application::use_cases::dispatch_service::DispatchRequest {
        name: body.name,
        args: body.args,
        intent: body.intent,
        source: ActivitySource::Api,
        session_id: None,
        parent_id: None,
        deadline: None,
    };
    let response = state.dispatch.call(request, CancellationToken::new()).await?;
    Ok(Json(ToolCallResponse {
        result: response.result,
        is_error: response.is_error,
        truncated: response.truncated,
        request_id: response.request_id.0,
    }))
}
