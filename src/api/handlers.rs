//! HTTP endpoint handlers

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::Json};
use tracing::error;

use crate::state::AppState;

use super::responses::{HealthResponse, StatusResponse};

/// Handle GET /status - current timer and server snapshot
pub async fn status_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StatusResponse>, StatusCode> {
    let timer = match state.snapshot() {
        Ok(snapshot) => snapshot,
        Err(e) => {
            error!("Failed to read timer state: {}", e);
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    Ok(Json(StatusResponse {
        timer,
        server: state.info.clone(),
        tunnel_url: state.tunnel.current_url().await,
        uptime: state.get_uptime(),
    }))
}

/// Handle GET /health - health check endpoint
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}
