//! Wires every concrete adapter into the collaborators
//! [`mcproxy_server::AppState`] needs, and starts the Control Surface.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use mcproxy_application::use_cases::diagnostics_service::DiagnosticsService;
use mcproxy_application::use_cases::dispatch_service::DispatchEngine;
use mcproxy_domain::entities::{ActivityRecord, ActivitySource, ActivityStatus, ActivityType};
use mcproxy_domain::ports::ActivityBus;
use mcproxy_domain::value_objects::{ActivityId, RequestId};
use mcproxy_infrastructure::config::{ConfigLoader, ConfigWatcher, DaemonConfig};
use mcproxy_infrastructure::events::BroadcastActivityBus;
use mcproxy_infrastructure::store::SledStore;
use mcproxy_providers::policy::PolicyRule;
use mcproxy_providers::{ActorUpstreamManager, CompositeSecretResolver, InvertedToolIndex, RulePolicyEngine};
use mcproxy_server::AppState;

use crate::cli::Cli;

/// Publishes a `system_start`/`system_stop` activity (§2, §6), the one
/// pair of categories that isn't tied to any single server or tool.
pub async fn publish_system_activity(bus: &dyn ActivityBus, activity_type: ActivityType, version: &str) {
    let mut metadata = serde_json::Map::new();
    metadata.insert("version".to_owned(), serde_json::json!(version));
    let record = ActivityRecord {
        id: ActivityId::new(0, 0),
        activity_type,
        source: ActivitySource::Api,
        server_name: None,
        tool_name: None,
        status: ActivityStatus::Success,
        duration_ms: None,
        timestamp: chrono::Utc::now(),
        session_id: None,
        request_id: RequestId::new(),
        parent_id: None,
        arguments: None,
        response: None,
        response_truncated: false,
        error_message: None,
        intent: None,
        metadata,
    };
    if let Err(err) = bus.publish(record).await {
        tracing::warn!(error = %err, activity = activity_type.category(), "failed to publish system lifecycle activity");
    }
}

/// Exit codes the process may terminate with (§6).
#[derive(Debug, Clone, Copy)]
pub enum ExitCode {
    Success = 0,
    General = 1,
    PortConflict = 2,
    DatabaseLocked = 3,
    ConfigError = 4,
    PermissionDenied = 5,
}

/// Generates a fresh API key: 32 random bytes, hex-encoded, the same
/// shape `ServerIdentity` uses for its own digests.
fn generate_api_key() -> String {
    let mut bytes = [0u8; 32];
    rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut bytes);
    hex::encode(bytes)
}

/// Loads or creates `mcp_config.json`, generating and persisting an
/// API key on first run (§6 "auto-generated on first run and persisted").
fn load_or_init_config(loader: &ConfigLoader, data_dir: &std::path::Path) -> Result<DaemonConfig> {
    let mut config = loader
        .load_or_default(data_dir.to_path_buf())
        .context("failed to load mcp_config.json")?;
    if config.api_key.is_none() {
        config.api_key = Some(generate_api_key());
        loader.save(&config).context("failed to persist generated API key")?;
        tracing::info!("generated a new API key on first run");
    }
    Ok(config)
}

/// Everything [`run`] needs to hold for the lifetime of the process.
pub struct Daemon {
    pub state: AppState,
    pub router: axum::Router,
    pub data_dir: PathBuf,
    pub listen: Option<String>,
    pub _log_guards: Vec<tracing_appender::non_blocking::WorkerGuard>,
}

/// Builds every collaborator and the assembled router, without
/// binding any listener yet.
///
/// # Errors
/// Returns an error (mapped by the caller to the matching exit code)
/// if the config file is malformed, the persistent store is locked by
/// another process, or the file watcher cannot be started.
pub async fn build(cli: &Cli) -> Result<Daemon> {
    let data_dir = cli.resolved_data_dir();
    std::fs::create_dir_all(&data_dir).context("failed to create data directory")?;

    let config_path = cli.config.clone().unwrap_or_else(|| data_dir.join("mcp_config.json"));
    let loader = ConfigLoader::new(config_path);
    let mut config = load_or_init_config(&loader, &data_dir)?;
    if let Some(listen) = &cli.listen {
        config.listen = Some(listen.clone());
    }

    let log_guards = mcproxy_infrastructure::logging::init_logging(
        &config.logging.level,
        &config.log_dir(),
        cli.foreground || config.logging.stderr,
    )
    .map_err(|err| anyhow::anyhow!("tracing subscriber already initialized: {err}"))?;

    let store = Arc::new(SledStore::open(data_dir.join("mcproxy.db")).context("failed to open persistent store")?);
    let bus = Arc::new(BroadcastActivityBus::new(store.clone()));
    let secrets = Arc::new(CompositeSecretResolver::new());
    let tool_index = Arc::new(InvertedToolIndex::new());
    let policy = Arc::new(RulePolicyEngine::new(vec![PolicyRule::allow_reads()]));

    let upstream = Arc::new(ActorUpstreamManager::new(
        loader.path().display().to_string(),
        secrets.clone(),
        tool_index.clone(),
        bus.clone(),
        store.clone(),
        config.log_dir(),
    ));
    upstream.bootstrap(config.mcp_servers.clone()).await;

    let dispatch = Arc::new(DispatchEngine::new(
        upstream.clone(),
        policy.clone(),
        bus.clone(),
        config.tool_response_limit,
        Duration::from_secs(30),
    ));
    let diagnostics = Arc::new(DiagnosticsService::new(upstream.clone(), secrets.clone(), env!("CARGO_PKG_VERSION").to_owned()));

    let watcher = Arc::new(ConfigWatcher::start(loader.clone(), config, bus.clone()).context("failed to start config file watcher")?);

    let state = AppState {
        upstream,
        policy,
        bus,
        store,
        tool_index,
        secrets,
        dispatch,
        diagnostics,
        config: watcher,
        config_loader: loader,
        started_at: chrono::Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_owned(),
    };

    let router = mcproxy_server::build_router(state.clone());
    let listen = state.config.current().listen.clone();

    publish_system_activity(state.bus.as_ref(), ActivityType::SystemStart, &state.version).await;

    Ok(Daemon {
        state,
        router,
        data_dir,
        listen,
        _log_guards: log_guards,
    })
}
