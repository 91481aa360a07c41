//! The REST error envelope (§6 "Error envelope") and its mapping from
//! the domain [`Error`](mcproxy_domain::Error).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use mcproxy_domain::error::ErrorCode;

/// One API error, ready to be serialized as `{error: {...}}` (§6).
#[derive(Debug, Clone, serde::Serialize)]
pub struct ApiError {
    code: ErrorCode,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    guidance: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    recovery_command: Option<String>,
}

impl ApiError {
    /// Builds an error with no request correlation or guidance.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            request_id: None,
            guidance: None,
            recovery_command: None,
        }
    }

    /// Attaches a request id for the caller to correlate against an
    /// activity record (§7 "The CLI prints the request_id...").
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Attaches operator-facing guidance, e.g. "check the server's
    /// oauth configuration".
    #[must_use]
    pub fn with_guidance(mut self, guidance: impl Into<String>) -> Self {
        self.guidance = Some(guidance.into());
        self
    }

    /// Attaches a copy-pasteable CLI command that would likely resolve this.
    #[must_use]
    pub fn with_recovery_command(mut self, command: impl Into<String>) -> Self {
        self.recovery_command = Some(command.into());
        self
    }

    fn status(&self) -> StatusCode {
        match self.code {
            ErrorCode::ConfigError
            | ErrorCode::ImmutableField
            | ErrorCode::MissingSecret => StatusCode::BAD_REQUEST,
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::PolicyDenied => StatusCode::FORBIDDEN,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::ServiceUnavailable | ErrorCode::StoreLocked => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::UpstreamError => StatusCode::BAD_GATEWAY,
            ErrorCode::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorCode::Canceled => StatusCode::from_u16(499).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            ErrorCode::StoreCorrupt | ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<mcproxy_domain::Error> for ApiError {
    fn from(err: mcproxy_domain::Error) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(serde_json::json!({ "error": self }))).into_response()
    }
}

/// Result alias for route handlers.
pub type ApiResult<T> = Result<T, ApiError>;
