//! SSE transport for the event bus
//!
//! Each connection gets its own event bucket, drained in a poll loop and
//! pushed to the client as one JSON object per event. Disconnecting removes
//! the bucket so dispatch stops copying events for it.

use crate::api::server::AppContext;
use axum::extract::State;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use futures::stream::Stream;
use jukeq_common::events::EventBus;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

/// How often an idle connection re-checks its bucket
const DRAIN_INTERVAL: Duration = Duration::from_millis(100);

/// Unsubscribes the bucket when the connection's stream is dropped.
struct BucketGuard {
    bus: Arc<EventBus>,
    id: Uuid,
}

impl Drop for BucketGuard {
    fn drop(&mut self) {
        self.bus.unsubscribe(self.id);
    }
}

/// GET /api/events - Event stream for overlays and other observers
pub async fn event_stream(
    State(ctx): State<AppContext>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let bucket = ctx.bus.subscribe();
    let guard = BucketGuard {
        bus: Arc::clone(&ctx.bus),
        id: bucket.id(),
    };
    info!(
        "New event stream client, {} connected",
        ctx.bus.subscriber_count()
    );

    let stream = async_stream::stream! {
        let _guard = guard;
        loop {
            let events = bucket.drain();
            if events.is_empty() {
                tokio::time::sleep(DRAIN_INTERVAL).await;
                continue;
            }
            for event in events {
                match SseEvent::default().json_data(&event) {
                    Ok(sse_event) => yield Ok(sse_event),
                    Err(e) => warn!("Failed to serialize event {}: {}", event.name, e),
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(30))
            .text("keep-alive"),
    )
}
