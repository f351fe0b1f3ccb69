// Module: http
// HTTP/JSON signaling API

pub mod error;
pub mod health;
pub mod signaling;

use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use mediabridge_core::config::ServerConfig;
use mediabridge_core::SignalingService;

pub use error::{AppError, AppResult};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub signaling: Arc<SignalingService>,
}

/// Create the HTTP router with all routes
pub fn create_router(signaling: Arc<SignalingService>, server: &ServerConfig) -> Router {
    let state = AppState { signaling };

    let router = Router::new()
        // Health check endpoint (for monitoring probes)
        .merge(health::create_health_router())
        // Atomic one-shot signaling
        .route("/offer", post(signaling::offer))
        // Router and transport parameter queries
        .route(
            "/getRouterRtpCapabilities",
            get(signaling::get_router_rtp_capabilities),
        )
        .route("/getIceParameters", get(signaling::get_ice_parameters))
        .route("/getIceCandidates", get(signaling::get_ice_candidates))
        .route("/getDtlsParameters", get(signaling::get_dtls_parameters))
        // Two-phase signaling
        .route("/createTransport", post(signaling::create_transport))
        .route("/connectTransport", post(signaling::connect_transport))
        .route("/produce", post(signaling::produce))
        .route("/consume", post(signaling::consume))
        // Explicit teardown
        .route(
            "/transports/{transportId}",
            delete(signaling::close_transport),
        )
        // Client assets
        .nest_service("/js", ServeDir::new(&server.js_dir))
        .nest_service("/static", ServeDir::new(&server.static_dir));

    // Apply layers before state
    let router = router
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    // Apply state to all routes (must be last)
    router.with_state(state)
}
