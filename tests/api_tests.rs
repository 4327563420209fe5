//! Integration tests for the HTTP surface.
//!
//! Tests drive the Axum `Router` directly via `tower::ServiceExt` without
//! starting a TCP server. This validates handler logic and routing without
//! needing a live network connection.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use stage_timer::create_router;
use stage_timer::state::AppState;
use stage_timer::tunnel::TunnelManager;
use stage_timer::utils::net::ServerInfo;
use tower::ServiceExt;

fn make_test_state() -> Arc<AppState> {
    let info = ServerInfo {
        port: 4580,
        hostname: "stagebox".to_string(),
        addresses: vec!["127.0.0.1".to_string()],
    };
    let tunnel = TunnelManager::new(
        "cloudflared".to_string(),
        "http://127.0.0.1:4580".to_string(),
    );
    Arc::new(AppState::new(info, tunnel))
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_returns_ok() {
    let router = create_router(make_test_state());

    let response = router
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["version"], "1.0.0");
}

#[tokio::test]
async fn test_status_starts_idle() {
    let router = create_router(make_test_state());

    let response = router
        .oneshot(Request::get("/status").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["timer"]["timeLeft"], 0);
    assert_eq!(json["timer"]["status"], "IDLE");
    assert_eq!(json["tunnel_url"], Value::Null);
    assert_eq!(json["server"]["hostname"], "stagebox");
    assert_eq!(json["server"]["port"], 4580);
}

#[tokio::test]
async fn test_status_reflects_timer_state() {
    let state = make_test_state();
    state.set_and_start(300.0).unwrap();

    let router = create_router(Arc::clone(&state));
    let response = router
        .oneshot(Request::get("/status").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["timer"]["timeLeft"], 300);
    assert_eq!(json["timer"]["status"], "RUNNING");
    assert_eq!(json["timer"]["overtimeMode"], "COUNT_UP");
}

#[tokio::test]
async fn test_ws_route_is_registered() {
    let router = create_router(make_test_state());

    // Without upgrade headers the handshake is rejected, but the route must
    // exist.
    let response = router
        .oneshot(Request::get("/ws").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_ne!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_nonexistent_route_returns_404() {
    let router = create_router(make_test_state());

    let response = router
        .oneshot(Request::get("/nonexistent").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
