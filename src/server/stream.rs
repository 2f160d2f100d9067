//! Viewer event streams
//!
//! Each `GET` on an events route registers one hub subscription and holds it
//! for the life of the response. When the client goes away axum drops the
//! stream, which drops the `Subscription` and unregisters it.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;

use crate::error::Result;
use crate::hub::Subscription;
use crate::server::listener::AppState;

/// Comment text sent on idle streams
pub const HEARTBEAT: &str = "heartbeat";

/// `GET` handler for every events route
pub async fn events(
    State(state): State<AppState>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    let subscription = state.hub.subscribe()?;
    Ok(sse_response(subscription, state.config.keep_alive_interval))
}

/// Wrap a subscription as an SSE response with heartbeat comments
pub fn sse_response(
    subscription: Subscription,
    keep_alive: Duration,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    Sse::new(event_stream(subscription)).keep_alive(
        KeepAlive::new()
            .interval(keep_alive)
            .text(HEARTBEAT),
    )
}

/// One SSE frame per hub event; ends when the hub shuts down
pub fn event_stream(
    subscription: Subscription,
) -> impl Stream<Item = std::result::Result<Event, Infallible>> {
    async_stream::stream! {
        let id = subscription.id();
        tracing::debug!(subscriber_id = id, "Event stream opened");

        while let Some(event) = subscription.recv().await {
            yield Ok(Event::default()
                .id(event.sequence().to_string())
                .data(event.json()));
        }

        tracing::debug!(subscriber_id = id, "Event stream ended");
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use futures::StreamExt;

    use super::*;
    use crate::frame::{FrameSet, SlotPayload};
    use crate::hub::Hub;

    fn frame() -> FrameSet {
        FrameSet::new(SlotPayload::new("text/plain", Bytes::from_static(b"hello")))
    }

    #[tokio::test]
    async fn test_stream_yields_published_events() {
        let hub = Hub::new();
        let stream = event_stream(hub.subscribe().unwrap());
        tokio::pin!(stream);

        hub.publish(frame()).unwrap();
        hub.publish(frame()).unwrap();

        assert!(stream.next().await.is_some());
        assert!(stream.next().await.is_some());
    }

    #[tokio::test]
    async fn test_stream_ends_on_shutdown() {
        let hub = Hub::new();
        let stream = event_stream(hub.subscribe().unwrap());
        tokio::pin!(stream);

        hub.publish(frame()).unwrap();
        hub.shutdown();

        assert!(stream.next().await.is_some());
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_dropping_stream_unsubscribes() {
        let hub = Hub::new();
        let stream = event_stream(hub.subscribe().unwrap());
        assert_eq!(hub.subscriber_count(), 1);

        drop(stream);
        assert_eq!(hub.subscriber_count(), 0);
    }
}
