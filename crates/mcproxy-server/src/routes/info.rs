//! `GET /api/v1/info` (§6).

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct InfoQuery {
    #[serde(default)]
    pub refresh: bool,
}

#[derive(Debug, Serialize)]
pub struct UpdateInfo {
    pub available: bool,
    pub latest_version: Option<String>,
    pub release_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct InfoResponse {
    pub version: String,
    pub listen: Option<String>,
    pub uptime_seconds: i64,
    pub update: UpdateInfo,
}

/// `refresh=true` would force a network round-trip to a release feed;
/// this daemon does not phone home, so the update check always
/// reports "no update known" rather than fabricating a feed to poll.
pub async fn info(State(state): State<AppState>, Query(query): Query<InfoQuery>) -> Json<InfoResponse> {
    let _ = query.refresh;
    let config = state.config.current();
    Json(InfoResponse {
        version: state.version.clone(),
        listen: config.listen.clone(),
        uptime_seconds: (chrono::Utc::now() - state.started_at).num_seconds().max(0),
        update: UpdateInfo {
            available: false,
            latest_version: None,
            release_url: None,
        },
    })
}
