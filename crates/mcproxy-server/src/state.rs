//! Shared state handed to every route handler and to the MCP-over-HTTP
//! service (§4.11 "Control Surface").

use std::sync::Arc;

use mcproxy_application::use_cases::dispatch_service::DispatchEngine;
use mcproxy_application::use_cases::diagnostics_service::DiagnosticsService;
use mcproxy_domain::ports::{ActivityBus, PersistentStore, PolicyEngine, SecretResolver, ToolIndex, UpstreamManager};
use mcproxy_infrastructure::config::{ConfigLoader, ConfigWatcher};

/// Everything a route handler needs, cloned cheaply (every field is an
/// `Arc`). Built once at daemon startup in the `mcproxy` bin crate.
#[derive(Clone)]
pub struct AppState {
    /// The Upstream Manager, source of truth for server lifecycle.
    pub upstream: Arc<dyn UpstreamManager>,
    /// The Policy Engine, consulted by `/hooks/evaluate`.
    pub policy: Arc<dyn PolicyEngine>,
    /// The Activity Bus, for `/activity` and `/events`.
    pub bus: Arc<dyn ActivityBus>,
    /// The Persistent Store, for config/server bookkeeping outside the
    /// hot path (e.g. reading persisted OAuth state for `/oauth/status`).
    pub store: Arc<dyn PersistentStore>,
    /// The Tool Index, for `/servers/{name}/tools` and the MCP `tools/list`.
    pub tool_index: Arc<dyn ToolIndex>,
    /// The Secret Resolver, for diagnostics.
    pub secrets: Arc<dyn SecretResolver>,
    /// The Dispatch Engine, the hot path every tool call flows through.
    pub dispatch: Arc<DispatchEngine>,
    /// Diagnostics aggregator.
    pub diagnostics: Arc<DiagnosticsService>,
    /// Hot-reloadable configuration snapshot, also the source of the
    /// current API key (§6 "may be rotated by config").
    pub config: Arc<ConfigWatcher>,
    /// Loader used by the Reconciler to persist `AddServerRequest`/patches.
    pub config_loader: ConfigLoader,
    /// When this process started, for `/info`.
    pub started_at: chrono::DateTime<chrono::Utc>,
    /// This build's version string.
    pub version: String,
}

impl AppState {
    /// The API key currently in effect, read fresh from the config
    /// snapshot so a rotation takes effect without a restart.
    #[must_use]
    pub fn current_api_key(&self) -> Option<String> {
        self.config.current().api_key.clone()
    }
}
