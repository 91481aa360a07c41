//! Persistent Store port (§4.1).

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

use crate::entities::ActivityRecord;
use crate::error::Result;
use crate::value_objects::ActivityId;

/// Filter applied server-side to activity queries and subscriptions (§6).
#[derive(Debug, Clone, Default)]
pub struct ActivityFilter {
    /// Restrict to one server name.
    pub server_name: Option<String>,
    /// Restrict to one tool name.
    pub tool_name: Option<String>,
    /// Restrict to one activity type category (e.g. `"tool_call"`).
    pub activity_type: Option<String>,
    /// Restrict to one status.
    pub status: Option<String>,
    /// Only records at or after this time.
    pub since: Option<chrono::DateTime<chrono::Utc>>,
}

impl ActivityFilter {
    /// Whether `record` satisfies every set predicate.
    #[must_use]
    pub fn matches(&self, record: &ActivityRecord) -> bool {
        if let Some(name) = &self.server_name {
            if record.server_name.as_deref() != Some(name.as_str()) {
                return false;
            }
        }
        if let Some(name) = &self.tool_name {
            if record.tool_name.as_deref() != Some(name.as_str()) {
                return false;
            }
        }
        if let Some(ty) = &self.activity_type {
            if record.activity_type.category() != ty {
                return false;
            }
        }
        if let Some(status) = &self.status {
            if record.status.as_str() != status {
                return false;
            }
        }
        if let Some(since) = self.since {
            if record.timestamp < since {
                return false;
            }
        }
        true
    }
}

/// A page of activity query results, plus the total matching count.
#[derive(Debug, Clone)]
pub struct ActivityPage {
    /// Records in this page, in ascending id order.
    pub records: Vec<ActivityRecord>,
    /// Total number of records matching the filter (not just this page).
    pub total: usize,
}

/// The embedded key-value store plus activity log (§4.1).
///
/// Single-writer, concurrent-reader: implementations must serialize
/// writes and let readers observe a consistent snapshot for the
/// duration of one call. Values are opaque JSON on the wire; typed
/// convenience wrappers are provided as default methods so the trait
/// itself stays object-safe (`Arc<dyn PersistentStore>`).
#[async_trait]
pub trait PersistentStore: Send + Sync {
    /// Stores a raw JSON value at `namespace/key`, fsync-durable before returning.
    async fn put_raw(&self, namespace: &str, key: &str, value: serde_json::Value) -> Result<()>;

    /// Loads a raw JSON value, or `None` if absent.
    async fn get_raw(&self, namespace: &str, key: &str) -> Result<Option<serde_json::Value>>;

    /// Deletes a key; no error if it was already absent.
    async fn delete(&self, namespace: &str, key: &str) -> Result<()>;

    /// Lists all keys in `namespace` whose key starts with `prefix`.
    async fn list_keys(&self, namespace: &str, prefix: &str) -> Result<Vec<String>>;

    /// Appends an activity record, assigning and returning its id.
    async fn append_activity(&self, record: ActivityRecord) -> Result<ActivityId>;

    /// Queries persisted activity records.
    async fn query_activity(
        &self,
        filter: &ActivityFilter,
        limit: usize,
        offset: usize,
    ) -> Result<ActivityPage>;

    /// Fetches a single activity record by id.
    async fn get_activity(&self, id: &ActivityId) -> Result<Option<ActivityRecord>>;
}

/// Typed convenience helpers layered over [`PersistentStore`]'s raw JSON API.
#[async_trait]
pub trait PersistentStoreExt: PersistentStore {
    /// Serializes `value` to JSON and stores it.
    async fn put_json<T: Serialize + Send + Sync>(
        &self,
        namespace: &str,
        key: &str,
        value: &T,
    ) -> Result<()> {
        let raw = serde_json::to_value(value)?;
        self.put_raw(namespace, key, raw).await
    }

    /// Loads and deserializes a typed value, or `None` if absent.
    async fn get_json<T: DeserializeOwned + Send + Sync>(
        &self,
        namespace: &str,
        key: &str,
    ) -> Result<Option<T>> {
        match self.get_raw(namespace, key).await? {
            Some(raw) => Ok(Some(serde_json::from_value(raw)?)),
            None => Ok(None),
        }
    }
}

impl<T: PersistentStore + ?Sized> PersistentStoreExt for T {}
