//! Interaction Relay server.
//!
//! This binary provides a thin web server that:
//! - Receives interaction callbacks on `POST /interactions`
//! - Verifies their Ed25519 signatures
//! - Returns each handler's first reply as the HTTP response
//! - Lets handlers edit that reply later in the background

mod commands;

use std::net::SocketAddr;

use anyhow::{Context, Result};
use reqwest::Client;
use tokio::{net::TcpListener, signal};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use url::Url;

use relay::{
    build_router, AppState, Authenticator, Config, Credentials, DeferredResponseBroker,
    Dispatcher, WebhookFollowUp,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("relay_server_starting");

    // Load configuration
    let config = Config::from_env();
    info!(
        port = config.port,
        static_public_key = config.public_key.is_some(),
        tenant_count = config.tenant_public_keys.as_ref().map(|t| t.len()).unwrap_or(0),
        application_id_configured = config.application_id.is_some(),
        reply_deadline_ms = config.reply_deadline_ms,
        signature_max_age_secs = ?config.signature_max_age_secs,
        "config_loaded"
    );

    // A missing or invalid public key is a deployment defect: refuse to start
    let credentials =
        Credentials::from_config(&config).context("Invalid credential configuration")?;

    let api_base = Url::parse(&config.api_base_url).context("Invalid API_BASE_URL")?;

    // Shared HTTP client for follow-up delivery
    let client = Client::builder()
        .pool_max_idle_per_host(32)
        .build()
        .context("Failed to create HTTP client")?;

    let follow_up = WebhookFollowUp::new(client, api_base, config.follow_up_timeout());
    let broker = DeferredResponseBroker::new(
        std::sync::Arc::new(follow_up),
        config.reply_deadline(),
        config.max_pending_follow_ups,
    );

    let registry = commands::registry();
    info!(handlers = ?registry.kinds(), "handlers_registered");

    let authenticator =
        Authenticator::new(credentials).with_max_age(config.signature_max_age_secs);
    let dispatcher = Dispatcher::new(registry, broker.clone());
    let state = AppState::new(authenticator, dispatcher);

    let app = build_router(state);

    // Bind to address
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "relay_server_listening");

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Let detached handler work and follow-ups finish
    broker.shutdown(config.shutdown_drain()).await;

    info!("relay_server_shutdown_complete");

    Ok(())
}

/// Create a future that completes when a shutdown signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("relay_server_shutting_down");
}
