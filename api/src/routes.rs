use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::middleware::auth_middleware;
use crate::state::AppState;

/// Create the main application router with all routes and middleware
#[tracing::instrument(skip(state))]
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public routes (no authentication required)
    let public_routes = Router::new().route("/health", get(handlers::health::health_check));

    // Protected routes (bearer token required)
    let protected_routes = Router::new()
        // Jobs
        .route(
            "/api/jobs",
            get(handlers::jobs::list_jobs).post(handlers::jobs::create_job),
        )
        .route(
            "/api/jobs/:id",
            get(handlers::jobs::get_job)
                .post(handlers::jobs::execute_job)
                .delete(handlers::jobs::delete_job),
        )
        // Triggers
        .route(
            "/api/triggers",
            get(handlers::triggers::list_job_triggers).delete(handlers::triggers::remove_trigger),
        )
        .route(
            "/api/triggers/schedule",
            axum::routing::delete(handlers::triggers::remove_job_triggers),
        )
        .route(
            "/api/simpleTriggers",
            post(handlers::triggers::schedule_simple_trigger),
        )
        .route(
            "/api/cronTriggers",
            post(handlers::triggers::schedule_cron_trigger),
        )
        .route("/api/triggers/:id", get(handlers::triggers::get_trigger))
        .route(
            "/api/triggers/:id/state",
            get(handlers::triggers::get_trigger_state),
        )
        .route(
            "/api/triggers/:id/pause",
            post(handlers::triggers::pause_trigger),
        )
        .route(
            "/api/triggers/:id/resume",
            post(handlers::triggers::resume_trigger),
        )
        .route("/api/fireTimes", get(handlers::triggers::fire_times))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // Metrics endpoint (no authentication for Prometheus scraping)
    let metrics_routes = Router::new().route("/metrics", get(handlers::metrics::metrics_handler));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(metrics_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
