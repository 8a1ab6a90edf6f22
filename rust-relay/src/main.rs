//! HubCall Web Server - Hub webhook and Call Provider callback receiver.
//!
//! This binary:
//! - Receives profile stream events from the Hub and requests outbound calls
//! - Serves the call control document to the Call Provider
//! - Writes finished recordings back to the Hub profile

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal};
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use hubcall::web::SignatureScheme;
use hubcall::{router, AppState, Config, HubClient, TwilioClient};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first so DEBUG can raise the default log level
    let config = Config::from_env();

    // Initialize structured JSON logging
    let default_level = if config.debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("web_server_starting");

    let signatures = SignatureScheme::from_key(config.callback_signing_key.as_deref());
    info!(
        port = config.port,
        deployment = %config.deployment,
        hub_api_host = %config.hub_api_host,
        hub_configured = config.hub_configured(),
        public_base_url = ?config.public_base_url,
        signature_scheme = signatures.name(),
        echo_call_debug = config.echo_call_debug,
        "config_loaded"
    );

    if !config.hub_configured() {
        warn!("hub_credentials_incomplete");
    }
    if signatures != SignatureScheme::Legacy {
        warn!("callback_signatures_keyed_previously_issued_urls_invalid");
    }

    // Create outbound clients
    let hub = HubClient::from_config(&config).context("Failed to create Hub client")?;
    let calls = TwilioClient::from_config(&config).context("Failed to create Call Provider client")?;

    // Create application state
    let port = config.port;
    let state = AppState::new(config, Arc::new(hub), Arc::new(calls));

    // Build the router
    let app = router(state);

    // Bind to address
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "web_server_listening");

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("web_server_shutdown_complete");

    Ok(())
}

/// Create a future that completes when a shutdown signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "ctrl_c_handler_failed");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "sigterm_handler_failed");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("web_server_shutting_down");
}
