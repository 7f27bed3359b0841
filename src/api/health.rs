//! Health check endpoints.
//!
//! Provides:
//! - `/health` — simple "healthy" + version (for load balancers)
//! - `/health/detailed` — per-bus subscriber counts and cache freshness

use axum::extract::Extension;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use buslive_core::RelayState;
use serde::Serialize;
use std::sync::Arc;

/// Simple health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Detailed health response with per-bus state
#[derive(Debug, Serialize)]
pub struct DetailedHealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub buses: Vec<BusHealth>,
}

/// One bus's relay state
#[derive(Debug, Serialize)]
pub struct BusHealth {
    pub id: String,
    pub subscribers: usize,
    /// Age of the cached value in seconds; absent until the first successful
    /// fetch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_age_secs: Option<f64>,
}

/// Simple health check (for load balancers)
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Per-bus subscriber counts and cache ages
async fn detailed_health_check(
    Extension(state): Extension<Arc<RelayState>>,
) -> Json<DetailedHealthResponse> {
    let mut buses = Vec::with_capacity(state.registry.len());
    for bus in state.registry.iter() {
        buses.push(BusHealth {
            id: bus.to_string(),
            subscribers: state.subscriptions.subscriber_count(bus),
            cache_age_secs: state.cache.age(bus).await.map(|d| d.as_secs_f64()),
        });
    }

    Json(DetailedHealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        buses,
    })
}

/// Create health routes
pub fn health_routes() -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/health/detailed", get(detailed_health_check))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_response_serialization() {
        let resp = HealthResponse {
            status: "healthy",
            version: "0.1.0",
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains("0.1.0"));
    }

    #[test]
    fn test_bus_health_omits_missing_age() {
        let h = BusHealth {
            id: "Bus1".to_string(),
            subscribers: 0,
            cache_age_secs: None,
        };
        let json = serde_json::to_string(&h).unwrap();
        assert!(!json.contains("cache_age_secs"));
    }
}
