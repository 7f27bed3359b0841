//! Per-bus subscriber sets and fan-out.

use crate::{BusId, BusRegistry};
use dashmap::DashMap;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;

/// Handle identifying one subscriber channel within a bus's set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

/// Dynamic sets of subscriber channels, one set per registered bus.
///
/// Channels are unbounded FIFO queues: every value published between a
/// subscriber's insertion and its removal is delivered in publish order.
/// (`tokio::broadcast` would be the obvious alternative but drops events for
/// lagging receivers; per-subscriber mpsc queues keep the no-drop guarantee.)
///
/// Membership changes interleave freely with fan-out and with other buses'
/// publishes; a subscriber removed mid-publish may or may not see that value.
pub struct SubscriptionHub {
    next_id: AtomicU64,
    buses: HashMap<BusId, DashMap<SubscriberId, mpsc::UnboundedSender<Value>>>,
}

impl SubscriptionHub {
    /// Empty subscriber sets for every registered bus.
    pub fn new(registry: &BusRegistry) -> Self {
        let buses = registry
            .iter()
            .map(|bus| (bus.clone(), DashMap::new()))
            .collect();
        Self {
            next_id: AtomicU64::new(0),
            buses,
        }
    }

    /// Register a new subscriber channel for the bus. Returns `None` if the
    /// bus is not in the registry.
    pub fn subscribe(
        &self,
        bus: &BusId,
    ) -> Option<(SubscriberId, mpsc::UnboundedReceiver<Value>)> {
        let set = self.buses.get(bus)?;
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::unbounded_channel();
        set.insert(id, tx);
        Some((id, rx))
    }

    /// Remove a subscriber channel. Idempotent: removing an already-removed
    /// or never-registered channel is a no-op.
    pub fn unsubscribe(&self, bus: &BusId, id: SubscriberId) {
        if let Some(set) = self.buses.get(bus) {
            set.remove(&id);
        }
    }

    /// Deliver `value` to every channel registered for the bus at the moment
    /// of the call. Returns the number of channels the value was handed to.
    pub fn publish(&self, bus: &BusId, value: &Value) -> usize {
        let Some(set) = self.buses.get(bus) else {
            return 0;
        };

        let mut delivered = 0;
        let mut dead = Vec::new();
        for entry in set.iter() {
            if entry.value().send(value.clone()).is_ok() {
                delivered += 1;
            } else {
                // Receiver already dropped; collect and remove after the
                // iteration to avoid deadlocking the shard.
                dead.push(*entry.key());
            }
        }
        for id in dead {
            set.remove(&id);
        }
        delivered
    }

    /// Number of channels currently registered for the bus.
    #[must_use]
    pub fn subscriber_count(&self, bus: &BusId) -> usize {
        self.buses.get(bus).map_or(0, |set| set.len())
    }
}
