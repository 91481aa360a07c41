//! Hot-reload watcher for `mcp_config.json` (§4.10 "every other
//! component reads a snapshot").
//!
//! Readers never see a torn write: [`arc_swap::ArcSwap`] publishes a
//! new [`DaemonConfig`] atomically on each successful reload.

use std::path::PathBuf;
use std::sync::Arc;

use arc_swap::ArcSwap;
use mcproxy_domain::entities::{ActivityRecord, ActivityStatus, ActivityType};
use mcproxy_domain::error::Result;
use mcproxy_domain::ports::ActivityBus;
use mcproxy_domain::value_objects::{ActivityId, RequestId};
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::runtime::Handle;

use crate::config::loader::ConfigLoader;
use crate::config::model::DaemonConfig;

/// Watches `mcp_config.json` for external edits and keeps an
/// [`ArcSwap`] snapshot current, publishing a `config_change` activity
/// on every successful reload (§6 SSE categories).
pub struct ConfigWatcher {
    loader: ConfigLoader,
    current: Arc<ArcSwap<DaemonConfig>>,
    _watcher: RecommendedWatcher,
}

impl ConfigWatcher {
    /// Starts watching `loader`'s path, seeded with `initial`.
    ///
    /// # Errors
    /// Returns an error if the underlying OS file watcher cannot be created.
    pub fn start(loader: ConfigLoader, initial: DaemonConfig, bus: Arc<dyn ActivityBus>) -> Result<Self> {
        let current = Arc::new(ArcSwap::from_pointee(initial));
        let runtime_handle = Handle::current();
        let watch_path = loader.path().to_path_buf();

        let watcher_loader = loader.clone();
        let watcher_current = Arc::clone(&current);
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                if !matches!(
                    res.as_ref().map(|e| &e.kind),
                    Ok(notify::EventKind::Modify(_)) | Ok(notify::EventKind::Create(_))
                ) {
                    return;
                }
                let loader = watcher_loader.clone();
                let current = Arc::clone(&watcher_current);
                let bus = Arc::clone(&bus);
                runtime_handle.spawn(async move {
                    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                    reload(&loader, &current, bus.as_ref()).await;
                });
            },
            Config::default(),
        )
        .map_err(|err| mcproxy_domain::error::Error::config(format!("failed to create file watcher: {err}")))?;

        watcher
            .watch(&watch_path, RecursiveMode::NonRecursive)
            .map_err(|err| mcproxy_domain::error::Error::config(format!("failed to watch '{}': {err}", watch_path.display())))?;

        Ok(Self {
            loader,
            current,
            _watcher: watcher,
        })
    }

    /// The current configuration snapshot.
    #[must_use]
    pub fn current(&self) -> Arc<DaemonConfig> {
        self.current.load_full()
    }

    /// Forces an immediate reload from disk, bypassing the debounce.
    pub async fn reload_now(&self, bus: &dyn ActivityBus) {
        reload(&self.loader, &self.current, bus).await;
    }

    /// The path being watched.
    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        self.loader.path()
    }
}

async fn reload(loader: &ConfigLoader, current: &Arc<ArcSwap<DaemonConfig>>, bus: &dyn ActivityBus) {
    match loader.load() {
        Ok(new_config) => {
            current.store(Arc::new(new_config));
            tracing::info!(path = %loader.path().display(), "configuration reloaded");
            let record = ActivityRecord {
                id: ActivityId::new(0, 0),
                activity_type: ActivityType::ConfigChange,
                source: mcproxy_domain::entities::ActivitySource::Api,
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
                metadata: serde_json::Map::new(),
            };
            if let Err(err) = bus.publish(record).await {
                tracing::warn!(error = %err, "failed to publish config_change activity");
            }
        }
        Err(err) => {
            tracing::warn!(error = %err, path = %loader.path().display(), "failed to reload configuration");
        }
    }
}
