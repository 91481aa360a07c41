//! `GET /api/v1/diagnostics` (§6, §4.12): read-only health aggregation.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct DiagnosticsResponse {
    pub total_issues: usize,
    pub upstream_errors: Vec<mcproxy_application::use_cases::diagnostics_service::ServerErrorEntry>,
    pub oauth_required: Vec<String>,
    pub oauth_issues: Vec<String>,
    pub missing_secrets: Vec<mcproxy_application::use_cases::diagnostics_service::MissingSecretEntry>,
    pub runtime_warnings: Vec<String>,
}

pub async fn diagnostics(State(state): State<AppState>) -> Json<DiagnosticsResponse> {
    // No component currently surfaces standalone runtime warnings
    // (e.g. a container-runtime probe); pass an empty list through the
    // same seam so one can be wired in without changing this handler.
    let report = state.diagnostics.report(Vec::new(), None).await;

    let total_issues = report.server_errors.len() + report.auth_required.len() + report.missing_secrets.len();

    Json(DiagnosticsResponse {
        total_issues,
        upstream_errors: report.server_errors,
        oauth_required: report.auth_required,
        oauth_issues: Vec::new(),
        missing_secrets: report.missing_secrets,
        runtime_warnings: report.warnings,
    })
}
