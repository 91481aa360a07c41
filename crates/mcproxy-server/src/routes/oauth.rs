//! `POST /api/v1/oauth/{name}/login`, `GET /api/v1/oauth/{name}/status` (§6).
//!
//! The flow itself (loopback listener, PKCE, token exchange) is owned
//! entirely by that server's Upstream Client actor; this surface only
//! triggers it and reports on persisted token state.

use axum::extract::{Path, State};
use axum::Json;
use mcproxy_domain::entities::OAuthState;
use mcproxy_domain::ports::PersistentStoreExt;
use serde::Serialize;

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct OAuthLoginResponse {
    pub authorize_url: String,
}

pub async fn login(State(state): State<AppState>, Path(name): Path<String>) -> ApiResult<Json<OAuthLoginResponse>> {
    let authorize_url = state.upstream.trigger_oauth(&name).await?;
    Ok(Json(OAuthLoginResponse { authorize_url }))
}

#[derive(Debug, Serialize)]
pub struct OAuthStatusResponse {
    pub authorized: bool,
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
    pub last_error: Option<String>,
}

pub async fn status(State(state): State<AppState>, Path(name): Path<String>) -> ApiResult<Json<OAuthStatusResponse>> {
    let server_status = state.upstream.get(&name).await?;
    let oauth_state = state
        .store
        .get_json::<OAuthState>("oauth", &server_status.server_id.0)
        .await?
        .unwrap_or_default();

    Ok(Json(OAuthStatusResponse {
        authorized: oauth_state.is_valid(),
        expires_at: oauth_state.expires_at,
        last_error: oauth_state.last_error,
    }))
}
