//! The Upstream Manager: a `DashMap`-backed registry of live client
//! actors, satisfying [`mcproxy_domain::ports::UpstreamManager`].

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use mcproxy_domain::entities::{ActivityRecord, ActivitySource, ActivityStatus, ActivityType, ServerConfig, ToolDescriptor};
use mcproxy_domain::error::{Error, Result};
use mcproxy_domain::ports::{
    ActivityBus, AdminState, BulkOutcome, LogLine, PersistentStore, ServerStatus, ToolCallOutcome, ToolIndex,
    UpstreamManager,
};
use mcproxy_domain::value_objects::{Intent, RequestId, ServerIdentity};

use super::client::{spawn_client, ClientCommand, ClientHandle};
use mcproxy_domain::ports::SecretResolver;

/// Per-item timeout bulk operations honor independently.
const BULK_ITEM_TIMEOUT: Duration = Duration::from_secs(30);

/// Owns every configured server's client actor, keyed by server name.
///
/// Each entry is a cheap [`ClientHandle`]; the actual transport and
/// state machine live inside the spawned task, never in this struct.
pub struct ActorUpstreamManager {
    clients: DashMap<String, ClientHandle>,
    config_path: String,
    secrets: Arc<dyn SecretResolver>,
    tool_index: Arc<dyn ToolIndex>,
    bus: Arc<dyn ActivityBus>,
    store: Arc<dyn PersistentStore>,
    log_dir: PathBuf,
}

impl ActorUpstreamManager {
    #[must_use]
    pub fn new(
        config_path: impl Into<String>,
        secrets: Arc<dyn SecretResolver>,
        tool_index: Arc<dyn ToolIndex>,
        bus: Arc<dyn ActivityBus>,
        store: Arc<dyn PersistentStore>,
        log_dir: PathBuf,
    ) -> Self {
        Self {
            clients: DashMap::new(),
            config_path: config_path.into(),
            secrets,
            tool_index,
            bus,
            store,
            log_dir,
        }
    }

    /// Spawns one client actor per server read from the daemon config
    /// at startup. Per-server failures are logged, not propagated: one
    /// malformed entry should not block the rest of the fleet.
    pub async fn bootstrap(&self, servers: Vec<ServerConfig>) {
        for config in servers {
            let name = config.name.clone();
            if let Err(err) = self.add(config).await {
                tracing::warn!(server = %name, error = %err, "failed to register server at startup");
            }
        }
    }

    fn entry(&self, name: &str) -> Result<dashmap::mapref::one::Ref<'_, String, ClientHandle>> {
        self.clients.get(name).ok_or_else(|| Error::NotFound {
            resource: format!("server '{name}'"),
        })
    }

    async fn send_and_await<T: Send + 'static>(
        &self,
        name: &str,
        build: impl FnOnce(oneshot::Sender<T>) -> ClientCommand,
    ) -> Result<T> {
        let sender = self.entry(name)?.sender();
        let (tx, rx) = oneshot::channel();
        sender
            .send(build(tx))
            .await
            .map_err(|_| Error::internal("client actor stopped"))?;
        rx.await.map_err(|_| Error::internal("client actor dropped reply channel"))
    }

    async fn publish_server_change(&self, server_name: &str, action: &str) {
        let record = ActivityRecord {
            id: mcproxy_domain::value_objects::ActivityId::new(0, 0),
            activity_type: ActivityType::ServerChange,
            source: ActivitySource::Api,
            server_name: Some(server_name.to_owned()),
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
            metadata: serde_json::json!({ "action": action }).as_object().cloned().unwrap_or_default(),
        };
        if let Err(err) = self.bus.publish(record).await {
            tracing::warn!(error = %err, "failed to publish server_change activity");
        }
    }

    async fn bulk(
        &self,
        name: Option<&str>,
        build: impl Fn(oneshot::Sender<Result<()>>) -> ClientCommand,
    ) -> Result<BulkOutcome> {
        let targets: Vec<(String, mpsc::Sender<ClientCommand>)> = match name {
            Some(n) => vec![(n.to_owned(), self.entry(n)?.sender())],
            None => self.clients.iter().map(|e| (e.key().clone(), e.sender())).collect(),
        };
        let total = targets.len();
        if total == 0 {
            return Ok(BulkOutcome {
                total: 0,
                successful: 0,
                failed: 0,
                errors: HashMap::new(),
            });
        }

        let results = futures::future::join_all(targets.into_iter().map(|(server_name, sender)| {
            let cmd = build;
            async move {
                let (tx, rx) = oneshot::channel();
                if sender.send(cmd(tx)).await.is_err() {
                    return (server_name, Err(Error::internal("client actor stopped")));
                }
                match tokio::time::timeout(BULK_ITEM_TIMEOUT, rx).await {
                    Ok(Ok(result)) => (server_name, result),
                    Ok(Err(_)) => (server_name, Err(Error::internal("client actor dropped reply channel"))),
                    Err(_) => (server_name, Err(Error::Timeout(BULK_ITEM_TIMEOUT))),
                }
            }
        }))
        .await;

        let mut outcome = BulkOutcome {
            total,
            successful: 0,
            failed: 0,
            errors: HashMap::new(),
        };
        for (server_name, result) in results {
            match result {
                Ok(()) => outcome.successful += 1,
                Err(err) => {
                    outcome.failed += 1;
                    outcome.errors.insert(server_name, err.to_string());
                }
            }
        }
        Ok(outcome)
    }
}

#[async_trait]
impl UpstreamManager for ActorUpstreamManager {
    async fn resolve_tool(&self, server_name: &str, tool_name: &str) -> Result<(ServerConfig, ToolDescriptor)> {
        let config = {
            let entry = self.entry(server_name)?;
            entry.config()
        };
        let tool = self
            .tool_index
            .get(server_name, tool_name)
            .await
            .ok_or_else(|| Error::NotFound {
                resource: format!("tool '{server_name}:{tool_name}'"),
            })?;
        Ok((config, tool))
    }

    async fn call_tool(
        &self,
        server_name: &str,
        tool_name: &str,
        args: serde_json::Value,
        intent: Option<&Intent>,
        cancel: CancellationToken,
    ) -> Result<ToolCallOutcome> {
        let intent = intent.cloned();
        let tool = tool_name.to_owned();
        self.send_and_await(server_name, |reply| ClientCommand::CallTool {
            tool,
            args,
            intent,
            cancel,
            reply,
        })
        .await?
    }

    async fn add(&self, config: ServerConfig) -> Result<ServerIdentity> {
        config.validate()?;
        if self.clients.contains_key(&config.name) {
            return Err(Error::InvalidArgument {
                message: format!("server '{}' already exists", config.name),
            });
        }
        let server_id = ServerIdentity::derive(&config.name, &self.config_path);
        let log_path = self.log_dir.join(format!("{}.log", config.name));
        let name = config.name.clone();
        let handle = spawn_client(
            server_id.clone(),
            config,
            Arc::clone(&self.secrets),
            Arc::clone(&self.tool_index),
            Arc::clone(&self.bus),
            Arc::clone(&self.store),
            log_path,
        );
        self.clients.insert(name.clone(), handle);
        self.publish_server_change(&name, "added").await;
        Ok(server_id)
    }

    async fn remove(&self, name: &str) -> Result<()> {
        let (_, handle) = self.clients.remove(name).ok_or_else(|| Error::NotFound {
            resource: format!("server '{name}'"),
        })?;
        let (tx, rx) = oneshot::channel();
        let _ = handle.sender().send(ClientCommand::Shutdown { grace: Duration::from_secs(5), reply: tx }).await;
        let _ = rx.await;
        self.tool_index.remove_server(&handle.server_id).await;
        self.publish_server_change(name, "removed").await;
        Ok(())
    }

    async fn restart(&self, name: Option<&str>) -> Result<BulkOutcome> {
        self.bulk(name, |reply| ClientCommand::Restart { reply }).await
    }

    async fn enable(&self, name: Option<&str>) -> Result<BulkOutcome> {
        self.bulk(name, |reply| ClientCommand::Enable { reply }).await
    }

    async fn disable(&self, name: Option<&str>) -> Result<BulkOutcome> {
        self.bulk(name, |reply| ClientCommand::Disable { reply }).await
    }

    async fn quarantine(&self, name: &str, on: bool) -> Result<()> {
        self.send_and_await(name, |reply| ClientCommand::Quarantine { on, reply }).await?
    }

    async fn trigger_oauth(&self, name: &str) -> Result<String> {
        self.send_and_await(name, |reply| ClientCommand::TriggerOAuth { reply }).await?
    }

    async fn list(&self) -> Vec<ServerStatus> {
        let snapshot: Vec<_> = self
            .clients
            .iter()
            .map(|e| (e.server_id.clone(), e.config(), e.state(), e.admin_state()))
            .collect();
        let mut statuses = Vec::with_capacity(snapshot.len());
        for (server_id, config, state, admin_state) in snapshot {
            let tool_count = self.tool_index.list_server(&server_id).await.len();
            statuses.push(ServerStatus { server_id, config, state, admin_state, tool_count });
        }
        statuses
    }

    async fn get(&self, name: &str) -> Result<ServerStatus> {
        let (server_id, config, state, admin_state) = {
            let entry = self.entry(name)?;
            (entry.server_id.clone(), entry.config(), entry.state(), entry.admin_state())
        };
        let tool_count = self.tool_index.list_server(&server_id).await.len();
        Ok(ServerStatus { server_id, config, state, admin_state, tool_count })
    }

    async fn logs(&self, name: &str, tail: usize) -> Result<Vec<LogLine>> {
        self.send_and_await(name, |reply| ClientCommand::Logs { tail, reply }).await
    }
}
