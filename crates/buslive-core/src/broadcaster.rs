//! Per-bus refresh loops: keep the cache fresh, fan out changes.

use crate::{BusId, RelayState};
use serde_json::Value;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Spawn one refresh loop per registered bus. The loops run until `shutdown`
/// is cancelled.
pub fn spawn_refresh_loops(
    state: &Arc<RelayState>,
    shutdown: &CancellationToken,
) -> Vec<JoinHandle<()>> {
    state
        .registry
        .iter()
        .cloned()
        .map(|bus| {
            let state = Arc::clone(state);
            let token = shutdown.clone();
            tokio::spawn(async move { refresh_loop(bus, state, token).await })
        })
        .collect()
}

/// One bus's poll/compare/publish cycle, ticking at the cache TTL.
///
/// Each tick refreshes the cache (which only hits the network when the slot
/// is stale), compares the result against the last value broadcast for this
/// bus and publishes on change. The first successful fetch always publishes.
/// Fetch failures are logged and retried on the next tick; nothing that
/// happens here can take down another bus's loop or the process.
pub async fn refresh_loop(bus: BusId, state: Arc<RelayState>, shutdown: CancellationToken) {
    let interval = state.cache.ttl();
    let mut last: Option<Value> = None;
    loop {
        refresh_tick(&bus, &state, &mut last).await;
        tokio::select! {
            () = tokio::time::sleep(interval) => {}
            () = shutdown.cancelled() => {
                debug!(bus = %bus, "refresh loop shutting down");
                break;
            }
        }
    }
}

async fn refresh_tick(bus: &BusId, state: &RelayState, last: &mut Option<Value>) {
    match state.cache.get_fresh(bus).await {
        Ok(value) => {
            // Structural comparison; the cache may refresh far more often
            // than the document actually changes.
            if last.as_ref() != Some(&value) {
                let delivered = state.subscriptions.publish(bus, &value);
                debug!(bus = %bus, subscribers = delivered, "broadcast new value");
                *last = Some(value);
            }
        }
        Err(e) if e.is_fetch_failure() => {
            warn!(bus = %bus, error = %e, "upstream fetch failed, retrying next tick");
        }
        Err(e) => {
            error!(bus = %bus, error = %e, "unexpected refresh error");
        }
    }
}
