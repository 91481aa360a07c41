//! `GET /events` (§6): the live Activity Bus stream.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use mcproxy_domain::ports::ActivityFilter;
use tokio_stream::StreamExt;

use crate::state::AppState;

/// Subscribes to the Activity Bus and reframes each record as
/// `event: activity.<category>.<phase>` (§6).
pub async fn events(State(state): State<AppState>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = match state.bus.subscribe(ActivityFilter::default()).await {
        Ok(stream) => stream,
        Err(err) => {
            tracing::warn!(error = %err, "failed to subscribe to activity bus for SSE");
            Box::pin(futures::stream::empty::<mcproxy_domain::entities::ActivityRecord>())
        }
    };

    let mapped = stream.map(|record| {
        let category = record.activity_type.category();
        // Only tool-call categories run through the started/completed
        // pair; everything else is published once as a non-phased
        // singleton (§6).
        let is_phased = matches!(
            record.activity_type,
            mcproxy_domain::entities::ActivityType::ToolCall | mcproxy_domain::entities::ActivityType::InternalToolCall
        );
        let event_name = if is_phased {
            let phase = match record.status {
                mcproxy_domain::entities::ActivityStatus::Started => "started",
                _ => "completed",
            };
            format!("activity.{category}.{phase}")
        } else {
            format!("activity.{category}")
        };
        let payload = serde_json::json!({
            "payload": record,
            "timestamp": chrono::Utc::now().timestamp(),
        });
        Ok(Event::default().event(event_name).json_data(payload).unwrap_or_else(|_| Event::default()))
    });

    Sse::new(mapped).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
