//! Server lifecycle management
//!
//! Builds the signaling service, mounts the HTTP router and runs the
//! listener until a shutdown signal arrives.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;

use mediabridge_api::create_router;
use mediabridge_core::{Config, LocalMediaEngine, SignalingService};

/// MediaBridge server - owns the signaling service and the HTTP listener
pub struct MediaBridgeServer {
    config: Config,
    signaling: Arc<SignalingService>,
}

impl MediaBridgeServer {
    /// Create a new server instance
    pub fn new(config: Config) -> Self {
        let signaling = Arc::new(SignalingService::new(
            config.router.capabilities(),
            Arc::new(LocalMediaEngine),
        ));
        Self { config, signaling }
    }

    pub fn signaling(&self) -> Arc<SignalingService> {
        Arc::clone(&self.signaling)
    }

    /// Start the HTTP server and wait for shutdown signal
    pub async fn start(self) -> Result<()> {
        let addr = self.config.server.address();
        let router = create_router(self.signaling, &self.config.server);

        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind {addr}"))?;
        info!("HTTP signaling server listening on {}", addr);

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("HTTP server error")?;

        info!("Server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}
