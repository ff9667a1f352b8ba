// Admin API module
// This file builds the HTTP router for the administrative surface:
// session pool management, runtime config and request telemetry
//
// Numan Thabit 2025 Nov

pub mod handlers;

use crate::registry::SessionRegistry;
use crate::telemetry::RequestLogger;
use axum::{
    routing::{delete, get, post},
    Router as AxumRouter,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

/// Default number of log entries returned by `/admin-api/logs`.
pub const DEFAULT_LOG_LIMIT: usize = 100;
/// Hard cap on `/admin-api/logs?limit=`.
pub const MAX_LOG_LIMIT: usize = 1000;

/// Shared state injected into every admin handler
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
    pub telemetry: Arc<RequestLogger>,
}

impl AppState {
    pub fn new(registry: Arc<SessionRegistry>, telemetry: Arc<RequestLogger>) -> Self {
        Self {
            registry,
            telemetry,
        }
    }
}

/// Create the HTTP router with admin endpoints
pub fn create_admin_router(state: AppState) -> AxumRouter {
    AxumRouter::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics))
        .route("/admin-api/status", get(handlers::status))
        .route("/admin-api/sessions", post(handlers::add_session))
        .route("/admin-api/sessions/test", post(handlers::test_session))
        .route("/admin-api/sessions/:index", delete(handlers::remove_session))
        .route(
            "/admin-api/sessions/by-id/:id",
            delete(handlers::remove_session_by_id),
        )
        .route("/admin-api/config", post(handlers::update_config))
        .route("/admin-api/stats", get(handlers::stats))
        .route("/admin-api/logs", get(handlers::logs))
        .route("/admin-api/logs/range", get(handlers::logs_in_range))
        .route("/admin-api/logs/clear", post(handlers::clear_logs))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}
