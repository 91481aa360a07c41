//! `/api/v1/servers...` (§6): server lifecycle and health.

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::Json;
use mcproxy_domain::entities::{IsolationConfig, OAuthConfig, Protocol, ServerConfig, UpstreamState};
use mcproxy_domain::ports::{AdminState, BulkOutcome, ServerStatus};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

fn default_true() -> bool {
    true
}

/// Body of `POST /api/v1/servers`.
#[derive(Debug, Deserialize)]
pub struct AddServerRequest {
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub protocol: Protocol,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub working_dir: Option<String>,
    #[serde(default)]
    pub oauth: Option<OAuthConfig>,
    #[serde(default)]
    pub isolation: Option<IsolationConfig>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl From<AddServerRequest> for ServerConfig {
    fn from(req: AddServerRequest) -> Self {
        let mut config = ServerConfig::new_default_quarantined(req.name);
        config.url = req.url;
        config.command = req.command;
        config.protocol = req.protocol;
        config.args = req.args;
        config.env = req.env;
        config.headers = req.headers;
        config.working_dir = req.working_dir;
        config.oauth = req.oauth;
        config.isolation = req.isolation;
        config.enabled = req.enabled;
        config
    }
}

/// One entry of `GET /api/v1/servers`: the declared config plus its
/// unified health projection (§6).
#[derive(Debug, Serialize)]
pub struct ServerListEntry {
    #[serde(flatten)]
    pub status: ServerStatus,
    pub level: &'static str,
    pub summary: String,
    pub detail: Option<String>,
    pub action: Option<&'static str>,
}

fn project(status: ServerStatus) -> ServerListEntry {
    let level = status.state.health_level();
    let (summary, detail, action) = match (&status.admin_state, &status.state) {
        (AdminState::Disabled, _) => ("disabled".to_owned(), None, Some("enable")),
        (AdminState::Quarantined, _) => ("quarantined, not connecting".to_owned(), None, Some("unquarantine")),
        (_, UpstreamState::Ready) => (format!("ready, {} tools", status.tool_count), None, None),
        (_, UpstreamState::Connecting) => ("connecting".to_owned(), None, None),
        (_, UpstreamState::Disconnected) => ("disconnected".to_owned(), None, Some("restart")),
        (_, UpstreamState::AuthRequired { auth_url }) => (
            "authorization required".to_owned(),
            Some(auth_url.clone()),
            Some("oauth_login"),
        ),
        (_, UpstreamState::Failed { last_error }) => {
            ("connection failing".to_owned(), Some(last_error.clone()), Some("restart"))
        }
        (_, UpstreamState::Quarantined) => ("quarantined".to_owned(), None, Some("unquarantine")),
    };
    ServerListEntry {
        status,
        level,
        summary,
        detail,
        action,
    }
}

pub async fn list(State(state): State<AppState>) -> Json<Vec<ServerListEntry>> {
    let statuses = state.upstream.list().await;
    Json(statuses.into_iter().map(project).collect())
}

pub async fn get(State(state): State<AppState>, Path(name): Path<String>) -> ApiResult<Json<ServerListEntry>> {
    let status = state.upstream.get(&name).await?;
    Ok(Json(project(status)))
}

/// Persists the current set of configured servers back to
/// `mcp_config.json`. The file watcher picks up the write and
/// publishes `config_change` on its own debounce (§4.10), so this is
/// a plain save rather than an explicit reload.
fn persist_servers(state: &AppState, servers: Vec<ServerConfig>) -> ApiResult<()> {
    let mut persisted = (*state.config.current()).clone();
    persisted.mcp_servers = servers;
    state.config_loader.save(&persisted).map_err(ApiError::from)
}

pub async fn add(State(state): State<AppState>, Json(body): Json<AddServerRequest>) -> ApiResult<Json<ServerListEntry>> {
    let config = ServerConfig::from(body);
    let name = config.name.clone();
    state.upstream.add(config.clone()).await?;

    let mut servers = state.config.current().mcp_servers.clone();
    servers.retain(|s| s.name != name);
    servers.push(config);
    persist_servers(&state, servers)?;

    let status = state.upstream.get(&name).await?;
    Ok(Json(project(status)))
}

pub async fn remove(State(state): State<AppState>, Path(name): Path<String>) -> ApiResult<()> {
    state.upstream.remove(&name).await?;
    let servers: Vec<_> = state
        .config
        .current()
        .mcp_servers
        .iter()
        .filter(|s| s.name != name)
        .cloned()
        .collect();
    persist_servers(&state, servers)?;
    Ok(())
}

pub async fn enable_one(State(state): State<AppState>, Path(name): Path<String>) -> ApiResult<Json<BulkOutcome>> {
    Ok(Json(state.upstream.enable(Some(&name)).await?))
}

pub async fn disable_one(State(state): State<AppState>, Path(name): Path<String>) -> ApiResult<Json<BulkOutcome>> {
    Ok(Json(state.upstream.disable(Some(&name)).await?))
}

pub async fn restart_one(State(state): State<AppState>, Path(name): Path<String>) -> ApiResult<Json<BulkOutcome>> {
    Ok(Json(state.upstream.restart(Some(&name)).await?))
}

pub async fn enable_all(State(state): State<AppState>) -> ApiResult<Json<BulkOutcome>> {
    Ok(Json(state.upstream.enable(None).await?))
}

pub async fn disable_all(State(state): State<AppState>) -> ApiResult<Json<BulkOutcome>> {
    Ok(Json(state.upstream.disable(None).await?))
}

pub async fn restart_all(State(state): State<AppState>) -> ApiResult<Json<BulkOutcome>> {
    Ok(Json(state.upstream.restart(None).await?))
}

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    #[serde(default = "default_tail")]
    pub tail: usize,
}

fn default_tail() -> usize {
    100
}

pub async fn logs(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<LogsQuery>,
) -> ApiResult<Json<Vec<mcproxy_domain::ports::LogLine>>> {
    Ok(Json(state.upstream.logs(&name, query.tail).await?))
}

pub async fn tools(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<Vec<mcproxy_domain::entities::ToolDescriptor>>> {
    let status = state.upstream.get(&name).await?;
    Ok(Json(state.tool_index.list_server(&status.server_id).await))
}

/// Response of `PATCH /api/v1/servers/{name}`: the merged config plus
/// what the patch actually changed (§4.10).
#[derive(Debug, Serialize)]
pub struct PatchServerResponse {
    pub entry: ServerListEntry,
    pub diff: mcproxy_application::use_cases::reconciler_service::MergeDiff,
}

/// Applies a "smart patch" (§4.10) to one server's declared config and
/// restarts it so the new settings take effect.
pub async fn patch(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> ApiResult<Json<PatchServerResponse>> {
    let servers = state.config.current().mcp_servers.clone();
    let base = servers
        .iter()
        .find(|s| s.name == name)
        .cloned()
        .ok_or_else(|| ApiError::new(mcproxy_domain::error::ErrorCode::NotFound, format!("server '{name}' not found")))?;

    let (merged, diff) = mcproxy_application::use_cases::reconciler_service::ConfigReconciler::merge(
        &base,
        &body,
        &mcproxy_application::use_cases::reconciler_service::MergeOptions::default(),
    )?;

    let mut next = servers;
    next.retain(|s| s.name != name);
    next.push(merged);
    persist_servers(&state, next)?;

    state.upstream.restart(Some(&name)).await?;
    let status = state.upstream.get(&name).await?;
    Ok(Json(PatchServerResponse {
        entry: project(status),
        diff,
    }))
}
