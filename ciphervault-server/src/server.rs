//! Axum router setup.

use crate::auth::auth_middleware;
use crate::config::ServerConfig;
use crate::handlers::{auth, sync};
use crate::storage::ServerStorage;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

pub fn build_router(storage: ServerStorage, config: &ServerConfig) -> Router {
    // Authenticated routes
    let authenticated = Router::new()
        .route("/auth/me", get(auth::me))
        .route("/api/v1/sync", post(sync::sync))
        .layer(middleware::from_fn_with_state(
            storage.clone(),
            auth_middleware,
        ));

    // Unauthenticated routes
    let public = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/token", post(auth::token))
        .route("/auth/check/{username}", get(auth::check))
        .route("/health", get(health));

    Router::new()
        .merge(authenticated)
        .merge(public)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(config.max_payload_size))
        .with_state(storage)
}

async fn health() -> &'static str {
    "ok"
}
