//! HTTP route definitions

use crate::{handlers, middleware, AppState};
use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Multipart framing allowance on top of the object size limit
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Create the gateway router
pub fn create_router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.max_object_size + MULTIPART_OVERHEAD;

    let router = Router::new()
        // Service endpoints
        .route("/health", get(handlers::health_check))
        // Bucket endpoints
        .route(
            "/buckets",
            post(handlers::create_bucket).get(handlers::list_buckets),
        )
        .route(
            "/buckets/{name}",
            get(handlers::get_bucket).delete(handlers::delete_bucket),
        )
        // Node endpoints
        .route("/nodes/register", post(handlers::register_node))
        .route("/nodes", get(handlers::list_nodes))
        .route("/nodes/{name}", get(handlers::get_node))
        .route("/nodes/{name}/status", put(handlers::set_node_status))
        .route("/nodes/{name}/health", get(handlers::probe_node))
        // Object endpoints
        .route("/objects/{bucket}", get(handlers::list_objects))
        .route(
            "/objects/{bucket}/{*key}",
            post(handlers::upload_object)
                .get(handlers::download_object)
                .delete(handlers::delete_object),
        )
        .route("/versions/{bucket}/{*key}", get(handlers::list_versions))
        // Apply middleware; the request id layer wraps logging
        .layer(axum_middleware::from_fn(middleware::logging_middleware))
        .layer(axum_middleware::from_fn(middleware::request_id_middleware));

    let router = if state.config.cors_enabled {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
                .expose_headers(Any),
        )
    } else {
        router
    };

    router
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
