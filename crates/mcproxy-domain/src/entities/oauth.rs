//! [`OAuthState`] (§3): per-server OAuth token bookkeeping.

use serde::{Deserialize, Serialize};

/// OAuth tokens and in-progress flow state for one server.
///
/// Mutated only by the [`crate::ports::UpstreamClient`] that owns the
/// server (§3 ownership summary).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OAuthState {
    /// Current access token, once obtained.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Refresh token, if the provider issued one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Expiry of `access_token`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
    /// Last error encountered during the flow.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// URL the user must visit to authorize, while `AuthRequired`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_url: Option<String>,
    /// PKCE code verifier for an in-flight authorization request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_code_verifier: Option<String>,
}

impl OAuthState {
    /// Whether the token is present and not expired.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        match (&self.access_token, &self.expires_at) {
            (Some(_), Some(exp)) => *exp > chrono::Utc::now(),
            (Some(_), None) => true,
            (None, _) => false,
        }
    }
}
