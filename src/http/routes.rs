use super::handlers;
use super::state::AppState;
use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Recording lifecycle
        .route("/calls/record/start", post(handlers::start_recording))
        .route("/calls/record/pause", post(handlers::pause_recording))
        .route("/calls/record/resume", post(handlers::resume_recording))
        .route("/calls/record/stop", post(handlers::stop_recording))
        .route("/calls/record/retry", post(handlers::retry_failed))
        .route("/calls/record", delete(handlers::delete_recording))
        // Progress polling
        .route("/calls/record/progress", get(handlers::get_progress))
        // Crash/reload recovery
        .route(
            "/calls/record/recovery",
            get(handlers::get_recovery).delete(handlers::discard_recovery),
        )
        .route(
            "/calls/record/recovery/resume",
            post(handlers::resume_from_recovery),
        )
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
