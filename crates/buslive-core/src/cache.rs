//! Per-bus TTL cache over the upstream store.

use crate::{BusId, BusRegistry, Error, FetchBusData, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Maximum age before a cached value must be refetched.
pub const CACHE_TTL: Duration = Duration::from_secs(2);

#[derive(Debug, Default)]
struct Slot {
    value: Option<Value>,
    fetched_at: Option<Instant>,
}

impl Slot {
    fn fresh(&self, ttl: Duration) -> Option<&Value> {
        match (&self.value, self.fetched_at) {
            (Some(v), Some(at)) if at.elapsed() <= ttl => Some(v),
            _ => None,
        }
    }
}

/// Last-fetched value per bus, refreshed when older than the TTL.
///
/// Each bus has its own slot behind an async mutex, and the mutex is held
/// across the upstream fetch: concurrent callers for the same bus queue on
/// the lock and re-check freshness once they hold it, so at most one fetch is
/// in flight per bus. Slots for different buses never share a lock.
pub struct BusCache {
    fetcher: Arc<dyn FetchBusData>,
    ttl: Duration,
    slots: HashMap<BusId, Mutex<Slot>>,
}

impl BusCache {
    /// Cache with the standard TTL, one slot per registered bus.
    pub fn new(registry: &BusRegistry, fetcher: Arc<dyn FetchBusData>) -> Self {
        Self::with_ttl(registry, fetcher, CACHE_TTL)
    }

    /// Cache with a custom TTL (tests, alternate deployments).
    pub fn with_ttl(
        registry: &BusRegistry,
        fetcher: Arc<dyn FetchBusData>,
        ttl: Duration,
    ) -> Self {
        let slots = registry
            .iter()
            .map(|bus| (bus.clone(), Mutex::new(Slot::default())))
            .collect();
        Self {
            fetcher,
            ttl,
            slots,
        }
    }

    /// Return the bus's current value, refetching if the slot is absent or
    /// stale. A failed fetch leaves the slot untouched and propagates; the
    /// previous value (if any) stays available for the next attempt.
    pub async fn get_fresh(&self, bus: &BusId) -> Result<Value> {
        let slot = self
            .slots
            .get(bus)
            .ok_or_else(|| Error::UnknownBus(bus.to_string()))?;

        let mut guard = slot.lock().await;
        if let Some(v) = guard.fresh(self.ttl) {
            return Ok(v.clone());
        }
        let value = self.fetcher.fetch(bus).await?;
        guard.value = Some(value.clone());
        guard.fetched_at = Some(Instant::now());
        Ok(value)
    }

    /// Age of the cached value, if one has ever been stored.
    pub async fn age(&self, bus: &BusId) -> Option<Duration> {
        let slot = self.slots.get(bus)?;
        let guard = slot.lock().await;
        guard.fetched_at.map(|at| at.elapsed())
    }

    /// The configured time-to-live.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}
