//! Shared relay state: registry, cache and subscriber sets.

use crate::{BusCache, BusRegistry, FetchBusData, SubscriptionHub};
use std::sync::Arc;
use std::time::Duration;

/// Everything the refresh loops and HTTP handlers share.
///
/// One instance per process, created at startup and passed around as an
/// `Arc`. Owning the cache and the subscription hub in one place keeps the
/// shared-state wiring explicit instead of scattered across globals.
pub struct RelayState {
    pub registry: BusRegistry,
    pub cache: BusCache,
    pub subscriptions: SubscriptionHub,
}

impl RelayState {
    /// State with the standard cache TTL.
    pub fn new(registry: BusRegistry, fetcher: Arc<dyn FetchBusData>) -> Self {
        let cache = BusCache::new(&registry, fetcher);
        let subscriptions = SubscriptionHub::new(&registry);
        Self {
            registry,
            cache,
            subscriptions,
        }
    }

    /// State with a custom cache TTL; the refresh loops tick at this interval.
    pub fn with_ttl(
        registry: BusRegistry,
        fetcher: Arc<dyn FetchBusData>,
        ttl: Duration,
    ) -> Self {
        let cache = BusCache::with_ttl(&registry, fetcher, ttl);
        let subscriptions = SubscriptionHub::new(&registry);
        Self {
            registry,
            cache,
            subscriptions,
        }
    }
}
