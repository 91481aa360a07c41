//! Route modules for `/api/v1/...` (§6).

pub mod activity;
pub mod code_exec;
pub mod diagnostics;
pub mod hooks;
pub mod info;
pub mod oauth;
pub mod servers;
pub mod tools_call;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Builds the `/api/v1` tree. Authentication is applied once, over the
/// whole router (`/api/v1`, `/mcp`, `/events`), in
/// [`crate::build_router`] rather than per-subtree (§6 "every request...
/// must include `X-API-Key`").
pub fn api_v1() -> Router<AppState> {
    Router::new()
        .route("/info", get(info::info))
        .route("/diagnostics", get(diagnostics::diagnostics))
        .route("/servers", get(servers::list).post(servers::add))
        .route("/servers/enable_all", post(servers::enable_all))
        .route("/servers/disable_all", post(servers::disable_all))
        .route("/servers/restart_all", post(servers::restart_all))
        .route("/servers/{name}", get(servers::get).delete(servers::remove).patch(servers::patch))
        .route("/servers/{name}/enable", post(servers::enable_one))
        .route("/servers/{name}/disable", post(servers::disable_one))
        .route("/servers/{name}/restart", post(servers::restart_one))
        .route("/servers/{name}/logs", get(servers::logs))
        .route("/servers/{name}/tools", get(servers::tools))
        .route("/oauth/{name}/login", post(oauth::login))
        .route("/oauth/{name}/status", get(oauth::status))
        .route("/activity", get(activity::list))
        .route("/activity/summary", get(activity::summary))
        .route("/activity/export", get(activity::export))
        .route("/activity/{id}", get(activity::get))
        .route("/tools/call", post(tools_call::call))
        .route("/code/exec", post(code_exec::exec))
        .route("/hooks/evaluate", post(hooks::evaluate))
}
