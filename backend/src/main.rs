//! FAPECAFE Process Phase Service - Backend Server
//!
//! Drives coffee lots through hulling, classification, density, color
//! sorting and packaging on top of the cooperative API.

use std::{net::SocketAddr, sync::Arc};

use fapecafe_backend::{
    create_app, external::ProcessApiClient, services::InFlightSubmissions, AppState, Config,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fapecafe_backend=debug,fpc_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::load()?;

    tracing::info!("Starting FAPECAFE Process Phase Server");
    tracing::info!("Environment: {}", config.environment);
    tracing::info!("Cooperative API: {}", config.api.base_url);

    let api = ProcessApiClient::new(&config.api)?;

    // Create application state
    let state = AppState {
        api,
        in_flight: InFlightSubmissions::default(),
        config: Arc::new(config.clone()),
    };

    // Build application
    let app = create_app(state);

    // Start server
    let host: std::net::IpAddr = config.server.host.parse()?;
    let addr = SocketAddr::from((host, config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
