use axum::Router;
use std::sync::Arc;
use tower_governor::key_extractor::PeerIpKeyExtractor;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::cors::CorsLayer;

use crate::payment::router as payment_router;
use crate::state::AppState;
use crate::ws::handler as ws_handler;

/// Build the full axum Router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    // Rate limiting on the externally reachable injection endpoints:
    // 5 requests burst, refilled at 5 per minute per IP.
    // Uses PeerIpKeyExtractor which reads from ConnectInfo<SocketAddr>
    let governor_config = Arc::new(
        GovernorConfigBuilder::default()
            .key_extractor(PeerIpKeyExtractor)
            .per_second(12) // 1 token every 12 seconds = 5 per minute
            .burst_size(5)
            .finish()
            .expect("Failed to build governor config"),
    );
    let governor_limiter = governor_config.limiter().clone();

    // Spawn background task to clean up rate limiter state
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
            governor_limiter.retain_recent();
        }
    });

    // Event injection API. The storefront test pages call these from
    // arbitrary origins, hence the permissive CORS layer.
    let api_routes = Router::new()
        .route(
            "/api/emulate-pix",
            axum::routing::post(payment_router::emulate_pix),
        )
        .route(
            "/api/notify-room",
            axum::routing::post(payment_router::notify_room_endpoint),
        )
        .layer(GovernorLayer::new(governor_config))
        .layer(CorsLayer::permissive());

    // WebSocket endpoint (session token via query param)
    let ws_routes = Router::new().route("/ws", axum::routing::get(ws_handler::ws_upgrade));

    // Health check
    let health = Router::new().route("/health", axum::routing::get(health_check));

    Router::new()
        .merge(api_routes)
        .merge(ws_routes)
        .merge(health)
        .with_state(state)
}

/// Basic health check endpoint
async fn health_check() -> &'static str {
    "ok"
}
