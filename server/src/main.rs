mod config;
mod error;
mod payment;
mod relay;
mod routes;
mod state;
mod ws;

use std::net::SocketAddr;
use tokio::net::TcpListener;

use config::{generate_config_template, Config};
use payment::webhook::WebhookForwarder;
use relay::Relay;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load config with layered precedence: defaults < TOML < env < CLI
    let config = Config::load()?;

    // Handle --generate-config: print template and exit
    if config.generate_config {
        print!("{}", generate_config_template());
        return Ok(());
    }

    // Initialize tracing/logging
    if config.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "pix_relay_server=info".parse().unwrap()),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "pix_relay_server=info".parse().unwrap()),
            )
            .init();
    }

    tracing::info!("PIX relay server v{} starting", env!("CARGO_PKG_VERSION"));

    if let Some(url) = &config.forward_url {
        tracing::info!(url = %url, "webhook forwarding enabled");
    }

    // Build application state: the relay owns all shared mutable state.
    let state = state::AppState::new(
        Relay::new(),
        WebhookForwarder::new(config.forward_url.clone()),
    );

    // Build router
    let app = routes::build_router(state);

    // Bind and serve
    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
