use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Recording pipeline
        .route("/transcribe", post(handlers::transcribe))
        // Notes
        .route(
            "/notes",
            post(handlers::create_note).get(handlers::list_notes),
        )
        // Identity allocation
        .route("/identity", post(handlers::allocate_identity))
        .route("/identity/stats", get(handlers::identity_stats))
        // Browser clients record in-page; allow cross-origin calls.
        .layer(CorsLayer::permissive())
        // Request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
