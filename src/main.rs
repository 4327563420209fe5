//! Stage Timer - a shared presentation countdown, synchronized in real time
//!
//! This is the main entry point for the stage-timer server.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::time::{sleep, Duration};
use tracing::info;

use stage_timer::{
    api::{create_router, Event},
    config::Config,
    state::AppState,
    tasks::tick_scheduler_task,
    tunnel::TunnelManager,
    utils::{net::ServerInfo, shutdown_signal},
};

/// Window for the shutdown notice to reach connected clients before exit.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(250);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "stage_timer={},tower_http=info",
            config.log_level()
        ))
        .init();

    info!("Starting stage-timer server v1.0.0");
    info!("Configuration: host={}, port={}", config.host, config.port);

    // Create application state
    let info = ServerInfo::discover(config.port).await;
    info!("Hostname: {}, addresses: {:?}", info.hostname, info.addresses);

    let tunnel = TunnelManager::new(config.tunnel_command.clone(), config.local_origin());
    let state = Arc::new(AppState::new(info, tunnel));

    // Start the tick scheduler background task
    let tick_state = Arc::clone(&state);
    tokio::spawn(async move {
        tick_scheduler_task(tick_state).await;
    });

    // Create HTTP router with all endpoints
    let app = create_router(Arc::clone(&state));

    // Bind to the specified address
    let addr = config.address();
    let listener = TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  GET  /ws     - Real-time timer channel (WebSocket)");
    info!("  GET  /status - Current timer and server snapshot");
    info!("  GET  /health - Health check");

    // Serve until a signal arrives or a client asks the process to exit
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
        _ = state.shutdown_requested() => {
            info!("Shutdown command received");
        }
    }

    // Tell every client the process is terminating, then give the frame a
    // moment to flush before the sockets drop.
    state.broadcast(Event::ServerShutdown);
    state.tunnel.close().await;
    sleep(SHUTDOWN_GRACE).await;

    info!("Server shutdown complete");
    Ok(())
}
