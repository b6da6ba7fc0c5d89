//! Router configuration for the HTTP surface.

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use super::handlers;
use super::middleware::create_cors_layer;
use crate::chat::ChatService;

/// Create the chat router.
pub fn create_router(service: Arc<ChatService>, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/messages", get(handlers::messages))
        .route("/post", post(handlers::post))
        .merge(create_health_router::<Arc<ChatService>>())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(create_cors_layer(cors_origins)),
        )
        .with_state(service)
}

/// Create a health check router.
pub fn create_health_router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route("/health", get(handlers::health))
}
