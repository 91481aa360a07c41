//! Activity Bus port (§4.6).

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::entities::ActivityRecord;
use crate::error::Result;
use crate::ports::store::ActivityFilter;

/// A live stream of activity records matching a subscriber's filter.
pub type ActivityStream = BoxStream<'static, ActivityRecord>;

/// One grouping key's counters within a `by=server|tool|status` breakdown
/// (§4.6 "aggregate counts by server/tool/status").
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct SummaryBucket {
    /// The server name, tool name, or status string this bucket groups by.
    pub key: String,
    /// Total records in this bucket.
    pub total_count: u64,
    /// Records with `status == success`.
    pub success_count: u64,
    /// Records with `status == error`.
    pub error_count: u64,
    /// Records with `status == blocked`.
    pub blocked_count: u64,
    /// `success_count / total_count`, `0.0` if the bucket is empty.
    pub success_rate: f64,
}

/// Aggregate counters for an activity summary window (§4.6).
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ActivitySummary {
    /// Total records in the window.
    pub total_count: u64,
    /// Records with `status == success`.
    pub success_count: u64,
    /// Records with `status == error`.
    pub error_count: u64,
    /// Records with `status == blocked`.
    pub blocked_count: u64,
    /// `success_count / total_count`, `0.0` if the window is empty.
    pub success_rate: f64,
    /// Per-`server`/`tool`/`status` breakdown, populated only when a
    /// `by` dimension was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub by: Option<Vec<SummaryBucket>>,
}

/// Publishes and broadcasts [`ActivityRecord`]s (§4.6).
///
/// `publish` must persist the record before broadcasting, giving
/// at-least-once delivery overall even though a single slow
/// subscriber may be dropped (at-most-once to that subscriber).
#[async_trait]
pub trait ActivityBus: Send + Sync {
    /// Assigns an id, persists, then broadcasts the record.
    async fn publish(&self, record: ActivityRecord) -> Result<ActivityRecord>;

    /// Subscribes to the live stream, filtered bus-side.
    async fn subscribe(&self, filter: ActivityFilter) -> Result<ActivityStream>;

    /// Serves a historical page entirely from persistence.
    async fn query(
        &self,
        filter: &ActivityFilter,
        limit: usize,
        offset: usize,
    ) -> Result<crate::ports::store::ActivityPage>;

    /// Computes (or returns the cached) summary for a named window
    /// (`"1h" | "24h" | "7d" | "30d"`), optionally broken down `by`
    /// one of `"server" | "tool" | "status"`. Each distinct
    /// `(window, by)` pair is cached for up to 60 s (§4.6, §8 scenario 6).
    async fn summary(&self, window: &str, by: Option<&str>) -> Result<ActivitySummary>;
}
