//! On-demand cached bus reads.

use super::ApiError;
use axum::extract::{Extension, Path};
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use buslive_core::{Error, RelayState};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Latest document for one bus, served from the cache and refetched when
/// stale. Shares the per-bus coalescing with the refresh loops.
async fn get_bus(
    Path(bus_id): Path<String>,
    Extension(state): Extension<Arc<RelayState>>,
) -> Result<Json<Value>, ApiError> {
    let bus = state
        .registry
        .resolve(&bus_id)
        .ok_or(Error::UnknownBus(bus_id))?;

    let value = state.cache.get_fresh(&bus).await?;
    debug!(bus = %bus, "served on-demand read");
    Ok(Json(value))
}

/// The registry's id list, so clients need not hardcode the fleet.
async fn list_buses(Extension(state): Extension<Arc<RelayState>>) -> Json<Vec<String>> {
    Json(state.registry.iter().map(ToString::to_string).collect())
}

/// Create bus read routes
pub fn bus_routes() -> Router {
    Router::new()
        .route("/api/buses", get(list_buses))
        .route("/api/:bus_id", get(get_bus))
}
