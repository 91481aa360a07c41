//! [`sled`]-backed [`PersistentStore`] (§4.1).
//!
//! `sled` gives us the single-writer, crash-safe semantics the port
//! requires for free: opening the same path twice returns an error we
//! map to [`Error::StoreLocked`], and every write is fsync'd before
//! the call returns.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use mcproxy_domain::entities::ActivityRecord;
use mcproxy_domain::error::{Error, Result};
use mcproxy_domain::ports::store::{ActivityFilter, ActivityPage, PersistentStore};
use mcproxy_domain::value_objects::ActivityId;

/// Namespace the activity log lives under, separate from arbitrary
/// `put_raw`/`get_raw` namespaces callers use.
const ACTIVITY_TREE: &str = "__activity";

/// Namespace holding store-internal metadata (currently just the schema
/// version), separate from the `put_raw`/`get_raw` namespaces callers use.
const META_TREE: &str = "__meta";

/// Key the schema version is stored under within [`META_TREE`].
const SCHEMA_VERSION_KEY: &[u8] = b"schema_version";

/// Schema version this build of the store understands. Bumped whenever
/// the on-disk layout changes in a way older builds can't read.
const SCHEMA_VERSION: u32 = 1;

fn map_sled_err(err: sled::Error) -> Error {
    let message = err.to_string();
    if message.to_lowercase().contains("lock") {
        Error::StoreLocked
    } else {
        Error::StoreCorrupt { message }
    }
}

/// Embedded-database-backed [`PersistentStore`].
pub struct SledStore {
    db: sled::Db,
    activity_tree: sled::Tree,
    sequence: AtomicU64,
}

impl SledStore {
    /// Opens (or creates) the store at `path`.
    ///
    /// On a fresh database, stamps the current [`SCHEMA_VERSION`]. On an
    /// existing one, refuses to open a schema newer than this build
    /// understands (§4.1 "refuses to open a newer schema").
    ///
    /// # Errors
    /// Returns [`Error::StoreLocked`] if another process already holds
    /// the database open, [`Error::StoreCorrupt`] if the on-disk schema
    /// version is newer than [`SCHEMA_VERSION`] or any other open
    /// failure.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = sled::open(path.as_ref()).map_err(map_sled_err)?;
        let activity_tree = db.open_tree(ACTIVITY_TREE).map_err(map_sled_err)?;
        Self::check_schema_version(&db)?;
        Ok(Self {
            db,
            activity_tree,
            sequence: AtomicU64::new(0),
        })
    }

    /// Stamps a fresh database with [`SCHEMA_VERSION`], or refuses to
    /// open one stamped with a version newer than this build supports.
    fn check_schema_version(db: &sled::Db) -> Result<()> {
        let meta_tree = db.open_tree(META_TREE).map_err(map_sled_err)?;
        match meta_tree.get(SCHEMA_VERSION_KEY).map_err(map_sled_err)? {
            Some(bytes) => {
                let stored: u32 = serde_json::from_slice(&bytes)?;
                if stored > SCHEMA_VERSION {
                    return Err(Error::StoreCorrupt {
                        message: format!(
                            "database schema version {stored} is newer than the {SCHEMA_VERSION} this build supports"
                        ),
                    });
                }
            }
            None => {
                let bytes = serde_json::to_vec(&SCHEMA_VERSION)?;
                meta_tree.insert(SCHEMA_VERSION_KEY, bytes).map_err(map_sled_err)?;
                meta_tree.flush().map_err(map_sled_err)?;
            }
        }
        Ok(())
    }

    fn mint_activity_id(&self) -> ActivityId {
        let timestamp_ms = chrono::Utc::now().timestamp_millis().max(0) as u64;
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        ActivityId::new(timestamp_ms, sequence)
    }
}

#[async_trait]
impl PersistentStore for SledStore {
    async fn put_raw(&self, namespace: &str, key: &str, value: serde_json::Value) -> Result<()> {
        let tree = self.db.open_tree(namespace).map_err(map_sled_err)?;
        let bytes = serde_json::to_vec(&value)?;
        tree.insert(key.as_bytes(), bytes).map_err(map_sled_err)?;
        tree.flush_async().await.map_err(map_sled_err)?;
        Ok(())
    }

    async fn get_raw(&self, namespace: &str, key: &str) -> Result<Option<serde_json::Value>> {
        let tree = self.db.open_tree(namespace).map_err(map_sled_err)?;
        match tree.get(key.as_bytes()).map_err(map_sled_err)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<()> {
        let tree = self.db.open_tree(namespace).map_err(map_sled_err)?;
        tree.remove(key.as_bytes()).map_err(map_sled_err)?;
        tree.flush_async().await.map_err(map_sled_err)?;
        Ok(())
    }

    async fn list_keys(&self, namespace: &str, prefix: &str) -> Result<Vec<String>> {
        let tree = self.db.open_tree(namespace).map_err(map_sled_err)?;
        let mut keys = Vec::new();
        for entry in tree.scan_prefix(prefix.as_bytes()) {
            let (key, _) = entry.map_err(map_sled_err)?;
            keys.push(String::from_utf8_lossy(&key).into_owned());
        }
        Ok(keys)
    }

    async fn append_activity(&self, mut record: ActivityRecord) -> Result<ActivityId> {
        let id = self.mint_activity_id();
        record.id = id.clone();
        let bytes = serde_json::to_vec(&record)?;
        self.activity_tree
            .insert(id.0.as_bytes(), bytes)
            .map_err(map_sled_err)?;
        self.activity_tree.flush_async().await.map_err(map_sled_err)?;
        Ok(id)
    }

    async fn query_activity(&self, filter: &ActivityFilter, limit: usize, offset: usize) -> Result<ActivityPage> {
        let mut matched = Vec::new();
        for entry in self.activity_tree.iter() {
            let (_, bytes) = entry.map_err(map_sled_err)?;
            let record: ActivityRecord = serde_json::from_slice(&bytes)?;
            if filter.matches(&record) {
                matched.push(record);
            }
        }
        let total = matched.len();
        let records = matched.into_iter().skip(offset).take(limit).collect();
        Ok(ActivityPage { records, total })
    }

    async fn get_activity(&self, id: &ActivityId) -> Result<Option<ActivityRecord>> {
        match self.activity_tree.get(id.0.as_bytes()).map_err(map_sled_err)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcproxy_domain::entities::{ActivitySource, ActivityStatus, ActivityType};
    use mcproxy_domain::value_objects::RequestId;

    fn sample_record() -> ActivityRecord {
        ActivityRecord {
            id: ActivityId::new(0, 0),
            activity_type: ActivityType::ToolCall,
            source: ActivitySource::Mcp,
            server_name: Some("gh".to_owned()),
            tool_name: Some("list_repos".to_owned()),
            status: ActivityStatus::Success,
            duration_ms: Some(12),
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
        }
    }

    #[tokio::test]
    async fn put_get_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledStore::open(dir.path()).unwrap();
        store
            .put_raw("servers", "gh", serde_json::json!({"name": "gh"}))
            .await
            .unwrap();
        let value = store.get_raw("servers", "gh").await.unwrap();
        assert_eq!(value, Some(serde_json::json!({"name": "gh"})));
    }

    #[tokio::test]
    async fn append_activity_assigns_sortable_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledStore::open(dir.path()).unwrap();
        let id1 = store.append_activity(sample_record()).await.unwrap();
        let id2 = store.append_activity(sample_record()).await.unwrap();
        assert!(id1 < id2);
    }

    #[tokio::test]
    async fn query_activity_filters_by_server() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledStore::open(dir.path()).unwrap();
        store.append_activity(sample_record()).await.unwrap();
        let mut other = sample_record();
        other.server_name = Some("slack".to_owned());
        store.append_activity(other).await.unwrap();

        let filter = ActivityFilter {
            server_name: Some("gh".to_owned()),
            ..Default::default()
        };
        let page = store.query_activity(&filter, 10, 0).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.records[0].server_name.as_deref(), Some("gh"));
    }

    #[tokio::test]
    async fn second_open_of_locked_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let _store = SledStore::open(dir.path()).unwrap();
        let second = SledStore::open(dir.path());
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn refuses_to_open_newer_schema() {
        let dir = tempfile::tempdir().unwrap();
        {
            let db = sled::open(dir.path()).unwrap();
            let meta = db.open_tree(META_TREE).unwrap();
            meta.insert(SCHEMA_VERSION_KEY, serde_json::to_vec(&(SCHEMA_VERSION + 1)).unwrap())
                .unwrap();
            meta.flush().unwrap();
        }
        let err = SledStore::open(dir.path()).unwrap_err();
        assert!(matches!(err, Error::StoreCorrupt { .. }));
    }

    #[tokio::test]
    async fn stamps_fresh_database_with_current_schema_version() {
        let dir = tempfile::tempdir().unwrap();
        {
            let _store = SledStore::open(dir.path()).unwrap();
        }
        let db = sled::open(dir.path()).unwrap();
        let meta = db.open_tree(META_TREE).unwrap();
        let stored: u32 = serde_json::from_slice(&meta.get(SCHEMA_VERSION_KEY).unwrap().unwrap()).unwrap();
        assert_eq!(stored, SCHEMA_VERSION);
    }

    #[tokio::test]
    async fn delete_removes_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledStore::open(dir.path()).unwrap();
        store.put_raw("servers", "gh", serde_json::json!(1)).await.unwrap();
        store.delete("servers", "gh").await.unwrap();
        assert_eq!(store.get_raw("servers", "gh").await.unwrap(), None);
    }
}
