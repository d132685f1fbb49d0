use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Create the application router with all routes and middleware
#[tracing::instrument(skip(state))]
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/api/jobs", get(handlers::jobs::list_jobs))
        .route("/api/jobs/:name", get(handlers::jobs::get_job))
        .route(
            "/api/jobs/:name/dispatch",
            post(handlers::dispatch::dispatch_job),
        )
        .route(
            "/api/executions",
            get(handlers::executions::list_executions),
        )
        .route(
            "/api/executions/:id",
            get(handlers::executions::get_execution),
        )
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
