//! The Upstream Client actor: one tokio task per configured server,
//! owning the transport and state machine exclusively.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;

use mcproxy_domain::entities::{
    ActivityRecord, ActivitySource, ActivityStatus, ActivityType, ServerConfig, UpstreamState,
};
use mcproxy_domain::error::{Error, Result};
use mcproxy_domain::ports::{
    ActivityBus, AdminState, LogLine, PersistentStore, PersistentStoreExt, SecretResolver, ToolCallOutcome, ToolIndex,
    UpstreamTransport,
};
use mcproxy_domain::value_objects::{Intent, RequestId, ServerIdentity};
use mcproxy_infrastructure::logging::SizeRotatingWriter;

use super::oauth_flow::LoopbackOAuthFlow;
use crate::transport::build_transport;

/// Consecutive connect failures after which a client gives up
/// reconnecting and surfaces `Failed` instead.
const FAILURE_THRESHOLD: u32 = 5;
const BACKOFF_BASE_MS: u64 = 1_000;
const BACKOFF_CAP_MS: u64 = 30_000;
const LOG_MAX_BYTES: u64 = 8 * 1024 * 1024;
const LOG_MAX_AGE: Duration = Duration::from_secs(24 * 3600);

/// A message sent to one client actor's mailbox.
pub enum ClientCommand {
    /// Invokes a tool on this server's live transport.
    CallTool {
        tool: String,
        args: serde_json::Value,
        intent: Option<Intent>,
        cancel: CancellationToken,
        reply: oneshot::Sender<Result<ToolCallOutcome>>,
    },
    /// Tears down and reconnects from scratch, resetting the failure count.
    Restart { reply: oneshot::Sender<Result<()>> },
    /// Marks the server enabled and schedules a connect attempt.
    Enable { reply: oneshot::Sender<Result<()>> },
    /// Marks the server disabled and tears down any live transport.
    Disable { reply: oneshot::Sender<Result<()>> },
    /// Sets or clears quarantine.
    Quarantine { on: bool, reply: oneshot::Sender<Result<()>> },
    /// Begins an OAuth authorization flow, returning the URL to visit.
    TriggerOAuth { reply: oneshot::Sender<Result<String>> },
    /// Replaces this client's configuration in place (reconciler edits).
    UpdateConfig { config: ServerConfig, reply: oneshot::Sender<Result<()>> },
    /// Tails the per-server log file.
    Logs { tail: usize, reply: oneshot::Sender<Vec<LogLine>> },
    /// Re-arms the reconnect timer immediately (used by a completed OAuth flow).
    InternalReconnect,
    /// Closes the transport and stops the actor task.
    Shutdown { grace: Duration, reply: oneshot::Sender<()> },
}

/// A cheap handle to a running client actor.
///
/// Status reads (`config`/`state`/`admin_state`) never touch the
/// mailbox: they read the latest value out of a `watch` channel, so
/// `UpstreamManager::list` stays fast even while a server is mid-call.
pub struct ClientHandle {
    pub server_id: ServerIdentity,
    config_rx: watch::Receiver<ServerConfig>,
    state_rx: watch::Receiver<UpstreamState>,
    admin_rx: watch::Receiver<AdminState>,
    commands: mpsc::Sender<ClientCommand>,
    task: tokio::task::JoinHandle<()>,
}

impl ClientHandle {
    #[must_use]
    pub fn config(&self) -> ServerConfig {
        self.config_rx.borrow().clone()
    }

    #[must_use]
    pub fn state(&self) -> UpstreamState {
        self.state_rx.borrow().clone()
    }

    #[must_use]
    pub fn admin_state(&self) -> AdminState {
        *self.admin_rx.borrow()
    }

    /// A clonable sender into this client's mailbox.
    #[must_use]
    pub fn sender(&self) -> mpsc::Sender<ClientCommand> {
        self.commands.clone()
    }

    /// Aborts the actor task outright, without draining its mailbox.
    ///
    /// Used by the manager only after `Shutdown` has already been sent
    /// and awaited; kept as a safety net against a wedged actor.
    pub fn abort(&self) {
        self.task.abort();
    }
}

#[allow(clippy::too_many_arguments)]
#[must_use]
pub fn spawn_client(
    server_id: ServerIdentity,
    config: ServerConfig,
    secrets: Arc<dyn SecretResolver>,
    tool_index: Arc<dyn ToolIndex>,
    bus: Arc<dyn ActivityBus>,
    store: Arc<dyn PersistentStore>,
    log_path: PathBuf,
) -> ClientHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(64);
    let admin_state = if config.quarantined {
        AdminState::Quarantined
    } else if !config.enabled {
        AdminState::Disabled
    } else {
        AdminState::Enabled
    };
    let initial_state = match admin_state {
        AdminState::Quarantined => UpstreamState::Quarantined,
        AdminState::Disabled | AdminState::Enabled => UpstreamState::Disconnected,
    };

    let (config_tx, config_rx) = watch::channel(config.clone());
    let (state_tx, state_rx) = watch::channel(initial_state);
    let (admin_tx, admin_rx) = watch::channel(admin_state);

    let log_writer = SizeRotatingWriter::open(&log_path, LOG_MAX_BYTES, LOG_MAX_AGE).ok();

    let actor = ClientActor {
        server_id: server_id.clone(),
        config_tx,
        state_tx,
        admin_tx,
        secrets,
        tool_index,
        bus,
        store,
        log_path,
        log_writer,
        transport: None,
        cancel: CancellationToken::new(),
        consecutive_failures: 0,
        reconnect_at: None,
        self_tx: cmd_tx.clone(),
    };
    let should_connect = matches!(admin_state, AdminState::Enabled);
    let task = tokio::spawn(actor.run(cmd_rx, should_connect));

    ClientHandle {
        server_id,
        config_rx,
        state_rx,
        admin_rx,
        commands: cmd_tx,
        task,
    }
}

struct ClientActor {
    server_id: ServerIdentity,
    config_tx: watch::Sender<ServerConfig>,
    state_tx: watch::Sender<UpstreamState>,
    admin_tx: watch::Sender<AdminState>,
    secrets: Arc<dyn SecretResolver>,
    tool_index: Arc<dyn ToolIndex>,
    bus: Arc<dyn ActivityBus>,
    store: Arc<dyn PersistentStore>,
    log_path: PathBuf,
    log_writer: Option<SizeRotatingWriter>,
    transport: Option<Arc<dyn UpstreamTransport>>,
    cancel: CancellationToken,
    consecutive_failures: u32,
    reconnect_at: Option<tokio::time::Instant>,
    self_tx: mpsc::Sender<ClientCommand>,
}

impl ClientActor {
    async fn run(mut self, mut inbox: mpsc::Receiver<ClientCommand>, should_connect: bool) {
        if should_connect {
            self.reconnect_at = Some(tokio::time::Instant::now());
        }
        loop {
            let sleep_for = self
                .reconnect_at
                .map(|at| at.saturating_duration_since(tokio::time::Instant::now()))
                .unwrap_or(Duration::from_secs(3600));

            tokio::select! {
                maybe_cmd = inbox.recv() => {
                    match maybe_cmd {
                        Some(ClientCommand::Shutdown { grace, reply }) => {
                            self.cancel.cancel();
                            if let Some(transport) = self.transport.take() {
                                transport.close(grace).await;
                            }
                            let _ = reply.send(());
                            break;
                        }
                        Some(cmd) => self.handle(cmd).await,
                        None => break,
                    }
                }
                () = tokio::time::sleep(sleep_for), if self.reconnect_at.is_some() => {
                    self.reconnect_at = None;
                    self.attempt_connect().await;
                }
            }
        }
    }

    async fn handle(&mut self, cmd: ClientCommand) {
        match cmd {
            ClientCommand::CallTool { tool, args, intent, cancel, reply } => {
                let result = self.call_tool(&tool, args, intent.as_ref(), cancel).await;
                let _ = reply.send(result);
            }
            ClientCommand::Restart { reply } => {
                if let Some(transport) = self.transport.take() {
                    transport.close(Duration::from_secs(5)).await;
                }
                self.consecutive_failures = 0;
                if matches!(*self.admin_tx.borrow(), AdminState::Enabled) {
                    self.reconnect_at = Some(tokio::time::Instant::now());
                } else {
                    self.set_state(UpstreamState::Disconnected);
                }
                let _ = reply.send(Ok(()));
            }
            ClientCommand::Enable { reply } => {
                self.admin_tx.send_replace(AdminState::Enabled);
                if !matches!(*self.state_tx.borrow(), UpstreamState::Ready) {
                    self.reconnect_at = Some(tokio::time::Instant::now());
                }
                self.publish_server_change("enabled").await;
                let _ = reply.send(Ok(()));
            }
            ClientCommand::Disable { reply } => {
                self.admin_tx.send_replace(AdminState::Disabled);
                self.reconnect_at = None;
                if let Some(transport) = self.transport.take() {
                    transport.close(Duration::from_secs(5)).await;
                }
                self.set_state(UpstreamState::Disconnected);
                self.publish_server_change("disabled").await;
                let _ = reply.send(Ok(()));
            }
            ClientCommand::Quarantine { on, reply } => {
                if on {
                    self.admin_tx.send_replace(AdminState::Quarantined);
                    self.reconnect_at = None;
                    if let Some(transport) = self.transport.take() {
                        transport.close(Duration::from_secs(5)).await;
                    }
                    self.set_state(UpstreamState::Quarantined);
                    self.publish_server_change("quarantined").await;
                } else {
                    self.admin_tx.send_replace(AdminState::Enabled);
                    self.consecutive_failures = 0;
                    self.reconnect_at = Some(tokio::time::Instant::now());
                    self.publish_server_change("unquarantined").await;
                }
                let _ = reply.send(Ok(()));
            }
            ClientCommand::TriggerOAuth { reply } => {
                let result = self.trigger_oauth().await;
                let _ = reply.send(result);
            }
            ClientCommand::UpdateConfig { config, reply } => {
                self.config_tx.send_replace(config);
                let _ = reply.send(Ok(()));
            }
            ClientCommand::Logs { tail, reply } => {
                let _ = reply.send(self.tail_log(tail));
            }
            ClientCommand::InternalReconnect => {
                if matches!(*self.admin_tx.borrow(), AdminState::Enabled) {
                    self.consecutive_failures = 0;
                    self.reconnect_at = Some(tokio::time::Instant::now());
                }
            }
            ClientCommand::Shutdown { .. } => unreachable!("handled in the run loop"),
        }
    }

    fn set_state(&self, state: UpstreamState) {
        self.state_tx.send_replace(state);
    }

    fn log_line(&mut self, level: &str, message: &str) {
        let line = format!("{} {level} {message}\n", chrono::Utc::now().to_rfc3339());
        if let Some(writer) = &mut self.log_writer {
            use std::io::Write;
            let _ = writer.write_all(line.as_bytes());
            let _ = writer.flush();
        }
    }

    fn tail_log(&self, tail: usize) -> Vec<LogLine> {
        let Ok(contents) = std::fs::read_to_string(&self.log_path) else {
            return Vec::new();
        };
        let lines: Vec<&str> = contents.lines().collect();
        let start = lines.len().saturating_sub(tail);
        lines[start..]
            .iter()
            .filter_map(|line| parse_log_line(line))
            .collect()
    }

    async fn resolve_map(&self, map: &HashMap<String, String>, prefix: &str) -> Result<HashMap<String, String>> {
        let mut resolved = HashMap::with_capacity(map.len());
        for (key, value) in map {
            let used_by = format!("{prefix}.{key}");
            resolved.insert(key.clone(), self.secrets.resolve(value, &used_by).await?);
        }
        Ok(resolved)
    }

    async fn attempt_connect(&mut self) {
        if !matches!(*self.admin_tx.borrow(), AdminState::Enabled) {
            return;
        }
        self.cancel = CancellationToken::new();
        self.set_state(UpstreamState::Connecting);

        let config = self.config_tx.borrow().clone();
        let env = match self.resolve_map(&config.env, &format!("{}.env", config.name)).await {
            Ok(env) => env,
            Err(err) => return self.handle_connect_error(err).await,
        };
        let headers = match self.resolve_map(&config.headers, &format!("{}.headers", config.name)).await {
            Ok(headers) => headers,
            Err(err) => return self.handle_connect_error(err).await,
        };

        let transport: Arc<dyn UpstreamTransport> = Arc::new(build_transport(&config, env, headers));
        if let Err(err) = transport.connect(self.cancel.clone()).await {
            return self.handle_connect_error(err).await;
        }
        match transport.list_tools(&self.server_id).await {
            Ok(tools) => {
                let tool_count = tools.len();
                self.tool_index.reindex_server(&self.server_id, tools).await;
                self.transport = Some(transport);
                self.consecutive_failures = 0;
                self.set_state(UpstreamState::Ready);
                self.log_line("info", &format!("connected, indexed {tool_count} tools"));
                self.publish_server_change("connected").await;
            }
            Err(err) => self.handle_connect_error(err).await,
        }
    }

    async fn handle_connect_error(&mut self, err: Error) {
        let message = err.to_string();
        self.log_line("error", &message);

        if looks_like_auth_challenge(&message) {
            let auth_url = self
                .config_tx
                .borrow()
                .oauth
                .as_ref()
                .and_then(|o| o.auth_url.clone())
                .unwrap_or_default();
            self.set_state(UpstreamState::AuthRequired { auth_url });
            self.reconnect_at = None;
            self.publish_server_change("auth_required").await;
            return;
        }

        self.consecutive_failures += 1;
        if self.consecutive_failures >= FAILURE_THRESHOLD {
            self.set_state(UpstreamState::Failed { last_error: message });
            self.reconnect_at = None;
            self.publish_server_change("failed").await;
        } else {
            self.set_state(UpstreamState::Disconnected);
            let delay = backoff_delay(self.consecutive_failures);
            self.reconnect_at = Some(tokio::time::Instant::now() + delay);
        }
    }

    async fn call_tool(
        &self,
        tool: &str,
        args: serde_json::Value,
        intent: Option<&Intent>,
        cancel: CancellationToken,
    ) -> Result<ToolCallOutcome> {
        let state = self.state_tx.borrow().clone();
        if !state.accepts_calls() {
            return Err(Error::UpstreamUnavailable {
                server: self.config_tx.borrow().name.clone(),
                reason: format!("{state:?}"),
            });
        }
        let Some(transport) = self.transport.clone() else {
            return Err(Error::UpstreamUnavailable {
                server: self.config_tx.borrow().name.clone(),
                reason: "not connected".to_owned(),
            });
        };
        tokio::select! {
            result = transport.call_tool(tool, args, intent, cancel) => result,
            () = self.cancel.cancelled() => Err(Error::Canceled),
        }
    }

    async fn trigger_oauth(&mut self) -> Result<String> {
        let config = self.config_tx.borrow().clone();
        let oauth_cfg = config.oauth.clone().ok_or_else(|| Error::Config {
            message: format!("server '{}' has no oauth configuration", config.name),
        })?;

        let flow = LoopbackOAuthFlow::start(&config.name, &oauth_cfg).await?;
        let auth_url = flow.authorize_url().to_owned();
        self.set_state(UpstreamState::AuthRequired { auth_url: auth_url.clone() });
        self.publish_server_change("auth_required").await;

        let store = Arc::clone(&self.store);
        let secrets = Arc::clone(&self.secrets);
        let server_id = self.server_id.clone();
        let self_tx = self.self_tx.clone();
        tokio::spawn(async move {
            match flow.complete(Duration::from_secs(300), secrets.as_ref()).await {
                Ok(oauth_state) => {
                    if let Err(err) = store.put_json("oauth", &server_id.0, &oauth_state).await {
                        tracing::warn!(server = %server_id, error = %err, "failed to persist oauth tokens");
                        return;
                    }
                    tracing::info!(server = %server_id, "oauth flow completed");
                    let _ = self_tx.send(ClientCommand::InternalReconnect).await;
                }
                Err(err) => tracing::warn!(server = %server_id, error = %err, "oauth flow failed"),
            }
        });

        Ok(auth_url)
    }

    async fn publish_server_change(&self, action: &str) {
        let name = self.config_tx.borrow().name.clone();
        let record = ActivityRecord {
            id: mcproxy_domain::value_objects::ActivityId::new(0, 0),
            activity_type: ActivityType::ServerChange,
            source: ActivitySource::Api,
            server_name: Some(name),
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
            metadata: serde_json::json!({ "action": action })
                .as_object()
                .cloned()
                .unwrap_or_default(),
        };
        if let Err(err) = self.bus.publish(record).await {
            tracing::warn!(error = %err, "failed to publish server_change activity");
        }
    }
}

fn looks_like_auth_challenge(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("401") || lower.contains("unauthorized") || lower.contains("oauth")
}

fn backoff_delay(attempt: u32) -> Duration {
    let exp = BACKOFF_BASE_MS.saturating_mul(1u64 << attempt.min(5)).min(BACKOFF_CAP_MS);
    let jitter = rand::thread_rng().gen_range(-0.2..=0.2);
    let millis = (exp as f64 * (1.0 + jitter)).max(0.0) as u64;
    Duration::from_millis(millis)
}

fn parse_log_line(line: &str) -> Option<LogLine> {
    let mut parts = line.splitn(3, ' ');
    let timestamp = chrono::DateTime::parse_from_rfc3339(parts.next()?).ok()?.with_timezone(&chrono::Utc);
    let level = parts.next()?.to_owned();
    let message = parts.next().unwrap_or_default().to_owned();
    Some(LogLine { timestamp, level, message })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_stays_within_base_and_cap() {
        for attempt in 1..10 {
            let delay = backoff_delay(attempt);
            assert!(delay.as_millis() as u64 <= (BACKOFF_CAP_MS as f64 * 1.2) as u64);
        }
    }

    #[test]
    fn auth_challenge_heuristic_matches_common_phrasing() {
        assert!(looks_like_auth_challenge("upstream error from 'gh': 401 Unauthorized"));
        assert!(looks_like_auth_challenge("oauth token expired"));
        assert!(!looks_like_auth_challenge("connection refused"));
    }

    #[test]
    fn log_line_round_trips() {
        let raw = "2026-01-01T00:00:00Z info connected, indexed 3 tools";
        let parsed = parse_log_line(raw).unwrap();
        assert_eq!(parsed.level, "info");
        assert_eq!(parsed.message, "connected, indexed 3 tools");
    }
}
