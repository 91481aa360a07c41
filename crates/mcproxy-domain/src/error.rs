//! Error handling types shared across every layer of the proxy.

use thiserror::Error;

/// Result type alias used throughout the proxy.
pub type Result<T> = std::result::Result<T, Error>;

/// Stable error kind carried in the REST error envelope (§7 / §6).
///
/// This is distinct from [`Error`]'s variant name: it is the small,
/// wire-stable `code` string callers can match on, while the variant
/// carries whatever context is useful for logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Configuration is invalid or missing.
    ConfigError,
    /// An immutable field was targeted by a patch.
    ImmutableField,
    /// API key missing or wrong.
    Unauthorized,
    /// Tool call blocked by policy.
    PolicyDenied,
    /// Target server is not in the `Ready` state.
    ServiceUnavailable,
    /// Upstream server returned an MCP-level error.
    UpstreamError,
    /// Operation timed out.
    Timeout,
    /// Operation was canceled by the caller.
    Canceled,
    /// Requested resource does not exist.
    NotFound,
    /// Secret reference could not be resolved.
    MissingSecret,
    /// The persistent store is held by another process.
    StoreLocked,
    /// The persistent store is corrupt.
    StoreCorrupt,
    /// Catch-all for anything not otherwise classified.
    Internal,
}

/// The proxy's single domain error type.
///
/// Every variant maps to one [`ErrorCode`] via [`Error::code`]; the
/// server crate turns that into the JSON error envelope of §6.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration is invalid.
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable description.
        message: String,
    },

    /// A patch attempted to modify an immutable field.
    #[error("field '{field}' is immutable and cannot be modified")]
    ImmutableField {
        /// Name of the offending field.
        field: String,
    },

    /// API key was missing or did not match.
    #[error("unauthorized: {message}")]
    Unauthorized {
        /// Human-readable description.
        message: String,
    },

    /// Policy engine blocked the call.
    #[error("policy denied: {reason}")]
    PolicyDenied {
        /// Reason the policy engine gave.
        reason: String,
    },

    /// Upstream server is not Ready.
    #[error("server '{server}' is not available: {reason}")]
    UpstreamUnavailable {
        /// Server name.
        server: String,
        /// Reason (not Ready, quarantined, disabled, ...).
        reason: String,
    },

    /// Upstream server returned an MCP-level error.
    #[error("upstream error from '{server}': {message}")]
    UpstreamError {
        /// Server name.
        server: String,
        /// Upstream-provided message.
        message: String,
    },

    /// Operation exceeded its deadline.
    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Operation was canceled.
    #[error("operation canceled")]
    Canceled,

    /// Resource not found.
    #[error("not found: {resource}")]
    NotFound {
        /// The resource that was not found.
        resource: String,
    },

    /// A secret reference could not be resolved.
    #[error("missing secret '{name}', referenced by {used_by:?}")]
    MissingSecret {
        /// The unresolved secret name.
        name: String,
        /// Servers/fields that referenced the secret.
        used_by: Vec<String>,
    },

    /// Invalid argument supplied by a caller.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the problem.
        message: String,
    },

    /// The persistent store is held by another process.
    #[error("database is locked by another process")]
    StoreLocked,

    /// The persistent store failed an integrity check.
    #[error("database is corrupt: {message}")]
    StoreCorrupt {
        /// Description of the corruption.
        message: String,
    },

    /// JSON (de)serialization failure.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Anything unexpected; carries a request id for correlation.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the problem.
        message: String,
    },
}

impl Error {
    /// Maps this error to its stable wire [`ErrorCode`].
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::Config { .. } => ErrorCode::ConfigError,
            Error::ImmutableField { .. } => ErrorCode::ImmutableField,
            Error::Unauthorized { .. } => ErrorCode::Unauthorized,
            Error::PolicyDenied { .. } => ErrorCode::PolicyDenied,
            Error::UpstreamUnavailable { .. } => ErrorCode::ServiceUnavailable,
            Error::UpstreamError { .. } => ErrorCode::UpstreamError,
            Error::Timeout(_) => ErrorCode::Timeout,
            Error::Canceled => ErrorCode::Canceled,
            Error::NotFound { .. } => ErrorCode::NotFound,
            Error::MissingSecret { .. } => ErrorCode::MissingSecret,
            Error::StoreLocked => ErrorCode::StoreLocked,
            Error::StoreCorrupt { .. } => ErrorCode::StoreCorrupt,
            Error::InvalidArgument { .. } | Error::Json(_) | Error::Io(_) => ErrorCode::Internal,
            Error::Internal { .. } => ErrorCode::Internal,
        }
    }

    /// Builds an [`Error::Internal`] from any error implementing `Display`.
    pub fn internal(message: impl std::fmt::Display) -> Self {
        Error::Internal {
            message: message.to_string(),
        }
    }

    /// Builds an [`Error::Config`] from any error implementing `Display`.
    pub fn config(message: impl std::fmt::Display) -> Self {
        Error::Config {
            message: message.to_string(),
        }
    }
}
