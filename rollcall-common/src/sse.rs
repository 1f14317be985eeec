//! Server-Sent Events (SSE) utilities

use crate::events::EventBus;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{Stream, StreamExt};
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info, warn};

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Stream every [`AttendanceEvent`](crate::events::AttendanceEvent) emitted on `bus`
/// to an SSE client, preceded by a `ConnectionStatus` event.
pub fn event_sse_stream(
    bus: &EventBus,
    service_name: &'static str,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("New SSE client connected to {} events", service_name);

    Sse::new(attendance_event_stream(bus)).keep_alive(
        KeepAlive::new()
            .interval(KEEP_ALIVE_INTERVAL)
            .text("heartbeat"),
    )
}

/// SSE events for `bus`, subscribed immediately
///
/// Lagged subscribers skip the missed events and keep streaming.
pub fn attendance_event_stream(bus: &EventBus) -> impl Stream<Item = Result<Event, Infallible>> {
    let capacity = bus.capacity();
    let rx = BroadcastStream::new(bus.subscribe());
    let events = rx.filter_map(move |result| async move {
        match result {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(json) => {
                    debug!("Broadcasting SSE event: {}", event.event_type());
                    Some(Ok(Event::default().event(event.event_type()).data(json)))
                }
                Err(e) => {
                    warn!("Failed to serialize event: {}", e);
                    None
                }
            },
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                warn!(skipped, capacity, "SSE client lagged behind event bus, events dropped");
                None
            }
        }
    });

    async_stream::stream! {
        yield Ok(Event::default().event("ConnectionStatus").data("connected"));

        futures::pin_mut!(events);
        while let Some(item) = events.next().await {
            yield item;
        }
    }
}
