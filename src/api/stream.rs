//! SSE stream sessions.
//!
//! One session per connection: subscribe, relay published values as event
//! frames until the client goes away, then unsubscribe. Cleanup is tied to
//! `Drop` of the response stream, so it runs on every exit path — client
//! disconnect included.

use super::ApiError;
use axum::extract::{Extension, Path};
use axum::response::sse::{Event, Sse};
use axum::routing::get;
use axum::Router;
use buslive_core::{BusId, Error, RelayState, SubscriberId};
use futures_util::Stream;
use serde_json::Value;
use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Open a stream of value updates for one bus.
async fn stream_bus(
    Path(bus_id): Path<String>,
    Extension(state): Extension<Arc<RelayState>>,
) -> Result<Sse<BusEventStream>, ApiError> {
    let bus = state
        .registry
        .resolve(&bus_id)
        .ok_or(Error::UnknownBus(bus_id))?;

    // Registry was checked above, so the set exists
    let (id, rx) = state
        .subscriptions
        .subscribe(&bus)
        .ok_or_else(|| Error::UnknownBus(bus.to_string()))?;

    info!(bus = %bus, "stream session opened");
    Ok(Sse::new(BusEventStream {
        state,
        bus,
        id,
        rx,
    }))
}

/// Subscriber channel bridged to the SSE transport.
///
/// Dropping the stream (the transport's disconnect signal) deregisters the
/// channel, so the subscriber set never accumulates dead entries.
struct BusEventStream {
    state: Arc<RelayState>,
    bus: BusId,
    id: SubscriberId,
    rx: mpsc::UnboundedReceiver<Value>,
}

impl Stream for BusEventStream {
    type Item = Result<Event, Infallible>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match this.rx.poll_recv(cx) {
            Poll::Ready(Some(value)) => match Event::default().json_data(&value) {
                Ok(event) => Poll::Ready(Some(Ok(event))),
                Err(e) => {
                    warn!(bus = %this.bus, error = %e, "dropping unserializable value");
                    Poll::Ready(None)
                }
            },
            // Hub side gone (only on teardown); end the stream
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for BusEventStream {
    fn drop(&mut self) {
        self.state.subscriptions.unsubscribe(&self.bus, self.id);
        info!(bus = %self.bus, "stream session closed");
    }
}

/// Create stream routes
pub fn stream_routes() -> Router {
    Router::new().route("/stream/:bus_id", get(stream_bus))
}

#[cfg(test)]
mod tests {
    use super::*;
    use buslive_core::{BusRegistry, FetchBusData, Result as CoreResult};
    use async_trait::async_trait;
    use futures_util::StreamExt;
    use serde_json::json;

    struct NoFetch;

    #[async_trait]
    impl FetchBusData for NoFetch {
        async fn fetch(&self, _bus: &BusId) -> CoreResult<Value> {
            Ok(Value::Null)
        }
    }

    fn state() -> Arc<RelayState> {
        Arc::new(RelayState::new(BusRegistry::numbered(1), Arc::new(NoFetch)))
    }

    #[tokio::test]
    async fn test_published_value_becomes_event() {
        let state = state();
        let bus = state.registry.resolve("Bus1").unwrap();
        let (id, rx) = state.subscriptions.subscribe(&bus).unwrap();
        let mut stream = BusEventStream {
            state: state.clone(),
            bus: bus.clone(),
            id,
            rx,
        };

        state.subscriptions.publish(&bus, &json!({"lat": 1}));
        let event = stream.next().await.unwrap().unwrap();
        // Event only exposes its wire form through the Sse response, so just
        // check that one arrived
        drop(event);
    }

    #[tokio::test]
    async fn test_drop_unsubscribes() {
        let state = state();
        let bus = state.registry.resolve("Bus1").unwrap();
        let (id, rx) = state.subscriptions.subscribe(&bus).unwrap();
        assert_eq!(state.subscriptions.subscriber_count(&bus), 1);

        drop(BusEventStream {
            state: state.clone(),
            bus: bus.clone(),
            id,
            rx,
        });
        assert_eq!(state.subscriptions.subscriber_count(&bus), 0);
    }
}
