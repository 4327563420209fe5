//! HTTP API module
//!
//! The WebSocket timer channel plus a small REST status surface.

pub mod handlers;
pub mod ingress;
pub mod protocol;
pub mod responses;
pub mod ws;

use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;

// Re-export the wire types
pub use protocol::{Command, Event};

/// Create the HTTP router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/status", get(handlers::status_handler))
        .route("/health", get(handlers::health_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
