//! `POST /api/v1/code/exec` (§6): runs an orchestrator script with a
//! sandboxed `call_tool` primitive bound in (§4.9).
//!
//! The JavaScript engine itself is out of scope here (§9): this
//! handler builds the session the engine would call into and enforces
//! the request-level limits, but does not embed a JS runtime.

use axum::extract::State;
use axum::Json;
use mcproxy_domain::entities::ActivitySource;
use mcproxy_domain::error::{Error, ErrorCode};
use mcproxy_domain::value_objects::ActivityId;
use serde::{Deserialize, Serialize};

use mcproxy_application::use_cases::orchestration_service::{OrchestrationLimits, OrchestrationSession};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const MAX_TIMEOUT_MS: u64 = 600_000;

#[derive(Debug, Deserialize)]
pub struct CodeExecRequest {
    pub code: String,
    #[serde(default)]
    pub input: serde_json::Value,
    pub timeout_ms: u64,
    #[serde(default = "default_max_tool_calls")]
    pub max_tool_calls: usize,
    #[serde(default)]
    pub allowed_servers: Vec<String>,
}

fn default_max_tool_calls() -> usize {
    32
}

#[derive(Debug, Serialize)]
pub struct CodeExecResponse {
    pub calls_made: usize,
}

/// Builds the sandbox session for `request`, enforcing the request
/// shape invariants, without running any script.
///
/// # Errors
/// Returns [`ApiError`] if `enable_code_execution` is off or
/// `timeout_ms` exceeds the 10-minute ceiling (§6).
pub async fn exec(State(state): State<AppState>, Json(request): Json<CodeExecRequest>) -> ApiResult<Json<CodeExecResponse>> {
    if !state.config.current().enable_code_execution {
        return Err(ApiError::new(ErrorCode::ServiceUnavailable, "code execution is disabled in this daemon's configuration"));
    }
    if request.timeout_ms > MAX_TIMEOUT_MS {
        return Err(Error::InvalidArgument {
            message: format!("timeout_ms must be <= {MAX_TIMEOUT_MS}"),
        }
        .into());
    }

    let limits = OrchestrationLimits {
        max_tool_calls: request.max_tool_calls,
        call_timeout: std::time::Duration::from_millis(request.timeout_ms),
        allowed_servers: (!request.allowed_servers.is_empty()).then_some(request.allowed_servers),
    };
    let session = OrchestrationSession::new(
        state.dispatch.clone(),
        ActivityId::new(0, 0),
        None,
        ActivitySource::Api,
        limits,
    );
    let _ = (request.code, request.input, session);

    Err(ApiError::new(
        ErrorCode::Internal,
        "no JavaScript runtime is embedded in this build; the call_tool sandbox contract is ready for an external engine to drive",
    )
    .with_guidance("the orchestrator's JS engine is out of scope for this build"))
}
