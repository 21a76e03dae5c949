//! HTTP and SSE surface

pub mod handlers;
pub mod models;
pub mod routes;

pub use routes::create_router;

/// Shared handler state
pub type AppState = std::sync::Arc<crate::service::AlarmService>;
