use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Recording control
        .route("/record/start", post(handlers::start_recording))
        .route("/record/stop/:recording_id", post(handlers::stop_recording))
        // Fire-and-forget control commands (mute, unmute, toggle, ...)
        .route(
            "/record/:recording_id/control",
            post(handlers::control_command),
        )
        // Queries
        .route(
            "/record/:recording_id/status",
            get(handlers::get_recording_status),
        )
        .route(
            "/record/:recording_id/transcript",
            get(handlers::get_recording_transcript),
        )
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
