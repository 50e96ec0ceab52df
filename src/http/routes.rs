use super::handlers;
use super::state::AppState;
use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Voice session control
        .route("/api/voice/start", post(handlers::start_voice))
        .route("/api/voice/stop", post(handlers::stop_voice))
        .route("/api/voice/status", get(handlers::voice_status))
        // Projects
        .route(
            "/api/projects",
            get(handlers::list_projects).post(handlers::create_project),
        )
        .route(
            "/api/projects/:project_id",
            get(handlers::get_project).delete(handlers::delete_project),
        )
        .route(
            "/api/projects/:project_id/status",
            put(handlers::update_project_status),
        )
        // Materials and payments
        .route(
            "/api/projects/:project_id/materials",
            post(handlers::add_material),
        )
        .route(
            "/api/materials/:material_id",
            delete(handlers::delete_material),
        )
        .route(
            "/api/projects/:project_id/payments",
            post(handlers::add_payment),
        )
        .route(
            "/api/payments/:payment_id",
            delete(handlers::delete_payment),
        )
        // Business summary
        .route("/api/dashboard", get(handlers::dashboard))
        // Assistant
        .route("/api/assistant/chat", post(handlers::assistant_chat))
        .route(
            "/api/assistant/visualize",
            post(handlers::assistant_visualize),
        )
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        // The browser UI is served from a different origin during development
        .layer(CorsLayer::permissive())
        .with_state(state)
}
