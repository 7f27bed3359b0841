//! Web API module for buslive
//!
//! Provides:
//! - On-demand cached reads (`/api/{bus_id}`, `/api/buses`)
//! - SSE update streams (`/stream/{bus_id}`)
//! - Health endpoints (`/health`, `/health/detailed`)

pub mod buses;
pub mod health;
pub mod stream;

use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::{Extension, Router};
use buslive_core::{Error, RelayState};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use buses::bus_routes;
pub use health::health_routes;
pub use stream::stream_routes;

/// Assemble the relay router over shared state.
pub fn app_router(state: Arc<RelayState>) -> Router {
    Router::new()
        .merge(health_routes())
        .merge(bus_routes())
        .merge(stream_routes())
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
        // Read-only API, open to any origin (the original deployment served
        // a public frontend from a different host)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET])
                .allow_headers(Any),
        )
}

/// Core error mapped onto a client-visible response.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self.0 {
            Error::UnknownBus(id) => {
                (StatusCode::NOT_FOUND, format!("unknown bus id: {id}"))
            }
            // Propagate the upstream's own status where it is a valid HTTP
            // status, as the original service did
            Error::UpstreamStatus { status } => (
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY),
                format!("upstream fetch failed with status {status}"),
            ),
            Error::UpstreamTransport(e) => (
                StatusCode::BAD_GATEWAY,
                format!("upstream request failed: {e}"),
            ),
        };
        (status, Json(serde_json::json!({ "detail": detail }))).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}
