//! `/api/v1/activity...` (§6): the queryable audit trail.

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use mcproxy_domain::error::{Error, ErrorCode};
use mcproxy_domain::ports::{ActivityFilter, ActivitySummary};
use mcproxy_domain::value_objects::ActivityId;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ActivityQuery {
    pub server_name: Option<String>,
    pub tool_name: Option<String>,
    pub activity_type: Option<String>,
    pub status: Option<String>,
    pub since: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    50
}

impl From<&ActivityQuery> for ActivityFilter {
    fn from(q: &ActivityQuery) -> Self {
        ActivityFilter {
            server_name: q.server_name.clone(),
            tool_name: q.tool_name.clone(),
            activity_type: q.activity_type.clone(),
            status: q.status.clone(),
            since: q.since,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ActivityPageResponse {
    pub activities: Vec<mcproxy_domain::entities::ActivityRecord>,
    pub total: usize,
}

pub async fn list(State(state): State<AppState>, Query(query): Query<ActivityQuery>) -> ApiResult<Json<ActivityPageResponse>> {
    let limit = query.limit.clamp(1, 100);
    let filter = ActivityFilter::from(&query);
    let page = state.bus.query(&filter, limit, query.offset).await?;
    Ok(Json(ActivityPageResponse {
        activities: page.records,
        total: page.total,
    }))
}

pub async fn get(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<mcproxy_domain::entities::ActivityRecord>> {
    let activity_id = ActivityId(id);
    let record = state
        .store
        .get_activity(&activity_id)
        .await?
        .ok_or_else(|| ApiError::new(ErrorCode::NotFound, format!("activity '{}' not found", activity_id.0)))?;
    Ok(Json(record))
}

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    #[serde(default = "default_period")]
    pub period: String,
    #[serde(default)]
    pub by: Option<String>,
}

fn default_period() -> String {
    "24h".to_owned()
}

pub async fn summary(
    State(state): State<AppState>,
    Query(query): Query<SummaryQuery>,
) -> ApiResult<Json<ActivitySummary>> {
    if !matches!(query.period.as_str(), "1h" | "24h" | "7d" | "30d") {
        return Err(Error::InvalidArgument {
            message: format!("unsupported period '{}'", query.period),
        }
        .into());
    }
    Ok(Json(state.bus.summary(&query.period, query.by.as_deref()).await?))
}

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default)]
    pub include_bodies: bool,
}

fn default_format() -> String {
    "json".to_owned()
}

pub async fn export(State(state): State<AppState>, Query(query): Query<ExportQuery>) -> ApiResult<Response> {
    let filter = ActivityFilter::default();
    let page = state.bus.query(&filter, 100_000, 0).await?;

    match query.format.as_str() {
        "json" => {
            let records: Vec<_> = page
                .records
                .into_iter()
                .map(|mut r| {
                    if !query.include_bodies {
                        r.arguments = None;
                        r.response = None;
                    }
                    r
                })
                .collect();
            Ok(Json(records).into_response())
        }
        "csv" => {
            let mut out = String::from("id,type,server,tool,status,timestamp,duration_ms\n");
            for record in page.records {
                out.push_str(&format!(
                    "{},{},{},{},{:?},{},{}\n",
                    record.id,
                    record.activity_type.category(),
                    record.server_name.unwrap_or_default(),
                    record.tool_name.unwrap_or_default(),
                    record.status,
                    record.timestamp.to_rfc3339(),
                    record.duration_ms.unwrap_or_default(),
                ));
            }
            Ok(([(axum::http::header::CONTENT_TYPE, "text/csv")], out).into_response())
        }
        other => Err(Error::InvalidArgument {
            message: format!("unsupported export format '{other}'"),
        }
        .into()),
    }
}
