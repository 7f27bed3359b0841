//! Cache/broadcast core for the buslive relay.
//!
//! One refresh loop per registered bus keeps a TTL cache warm from the
//! upstream JSON store and fans out value changes to any number of
//! subscriber channels. The HTTP surface in the `buslive` binary is a thin
//! layer over this crate.

pub mod broadcaster;
pub mod cache;
pub mod error;
pub mod fetch;
pub mod registry;
pub mod shutdown;
pub mod state;
pub mod subscriptions;

pub use broadcaster::{refresh_loop, spawn_refresh_loops};
pub use cache::{BusCache, CACHE_TTL};
pub use error::{Error, Result};
pub use fetch::{FetchBusData, UpstreamClient, FETCH_TIMEOUT};
pub use registry::{BusId, BusRegistry};
pub use shutdown::shutdown_signal;
pub use state::RelayState;
pub use subscriptions::{SubscriberId, SubscriptionHub};
