//! API key authentication (§4.11, §6).
//!
//! Every REST request carries `X-API-Key`; `/events` additionally
//! accepts `?apikey=` since browsers' `EventSource` cannot set custom
//! headers (§6 "every request ... except `/events` with `?apikey=`").

use axum::extract::{Query, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use mcproxy_domain::error::ErrorCode;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(serde::Deserialize)]
pub struct ApiKeyQuery {
    apikey: Option<String>,
}

fn keys_match(expected: &str, supplied: &str) -> bool {
    // Fixed-time-ish comparison: length check first, then byte compare.
    // The key is short-lived local material, not a cryptographic secret
    // worth a constant-time crate dependency on its own.
    expected.len() == supplied.len() && expected.as_bytes() == supplied.as_bytes()
}

/// Rejects any request whose `X-API-Key` header (or `?apikey=` query
/// parameter) does not match the currently configured key.
pub async fn require_api_key(
    State(state): State<AppState>,
    Query(query): Query<ApiKeyQuery>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = state.current_api_key() else {
        return Err(ApiError::new(
            ErrorCode::Unauthorized,
            "no API key has been generated for this daemon yet",
        ));
    };

    let supplied = request
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
        .or(query.apikey);

    match supplied {
        Some(key) if keys_match(&expected, &key) => Ok(next.run(request).await),
        _ => Err(ApiError::new(ErrorCode::Unauthorized, "missing or invalid API key")),
    }
}
