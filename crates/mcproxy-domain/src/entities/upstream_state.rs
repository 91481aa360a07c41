//! Upstream Client state machine (§4.3).

use serde::{Deserialize, Serialize};

/// The lifecycle state of one [`crate::ports::UpstreamClient`].
///
/// Transitions are documented on each variant; see §4.3 for the full
/// state diagram.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum UpstreamState {
    /// Not connected; no reconnect in flight.
    Disconnected,
    /// `initialize` handshake and tool listing in progress.
    Connecting,
    /// Handshake succeeded and tools are loaded; calls are accepted.
    Ready,
    /// Upstream reported a 401/OAuth challenge; `auth_url` set.
    AuthRequired {
        /// URL to send the user to in order to authorize.
        auth_url: String,
    },
    /// Administratively quarantined; no auto-reconnect, calls blocked.
    Quarantined,
    /// Consecutive connect failures exceeded the threshold.
    Failed {
        /// The last error observed.
        last_error: String,
    },
}

impl UpstreamState {
    /// Health level surfaced on `GET /servers` (§6).
    #[must_use]
    pub fn health_level(&self) -> &'static str {
        match self {
            UpstreamState::Ready => "healthy",
            UpstreamState::Connecting | UpstreamState::AuthRequired { .. } => "degraded",
            UpstreamState::Disconnected | UpstreamState::Failed { .. } => "unhealthy",
            UpstreamState::Quarantined => "unknown",
        }
    }

    /// Whether `CallTool` is accepted in this state.
    #[must_use]
    pub fn accepts_calls(&self) -> bool {
        matches!(self, UpstreamState::Ready)
    }
}
