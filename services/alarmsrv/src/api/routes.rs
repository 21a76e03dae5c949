//! API routes configuration

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::api::handlers::*;
use crate::api::AppState;

/// Create API routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/alarms/subscribe", get(subscribe))
        .route("/api/alarms/subscribe/{client_id}", delete(unsubscribe))
        .route("/api/alarms/stats", get(get_statistics))
        .route("/api/ingest", post(ingest))
        .route(
            "/api/conditions/{sensor_kind}",
            get(list_conditions)
                .put(replace_conditions)
                .delete(remove_conditions),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
