//! HTTP control surface for the relay board.
//!
//! Every relay endpoint translates one request into one controller call and the
//! controller's errors into status codes: 404 for relay numbers that do not
//! exist, 500 for hardware failures.

pub mod config;
pub mod handlers;
pub mod router;

// Re-export commonly used items
pub use config::WebConfig;
pub use handlers::{ERROR_MSG, SUCCESS_MSG};
pub use router::create_app;

use crate::error::{RelayError, Result};
use crate::relay::RelayController;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

/// Start the web server with the provided configuration and controller.
pub async fn start_web_server(config: WebConfig, controller: Arc<RelayController>) -> Result<()> {
    let app = create_app(&config, controller);

    // Parse the bind address
    let addr = config
        .bind_address()
        .parse::<SocketAddr>()
        .map_err(|e| RelayError::config_error(format!("Invalid bind address: {}", e)))?;

    info!("Starting relay board web server on http://{}", addr);
    info!("Control page available at http://{}/", addr);
    info!("API endpoint: http://{}/api/relays", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| RelayError::web_server_error(format!("Failed to bind to address: {}", e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| RelayError::web_server_error(format!("Server error: {}", e)))?;

    info!("Web server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
