use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tracing::info;

use surety::api::routes::{create_router, AppState};
use surety::config::Config;
use surety::genesis::Genesis;
use surety::observability::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse configuration
    let config = Config::parse();

    // Initialize tracing
    init_tracing(&config.log_level, config.log_json);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting surety node"
    );

    // Stand up the ledger from genesis
    let genesis = Genesis::load_or_development(config.genesis_path.as_deref())?;
    let fee_per_call = config.fee_per_call()?;
    let ledger = genesis.build(fee_per_call)?;

    info!(
        owner = %genesis.owner,
        first_airline = %genesis.first_airline,
        app = %genesis.app_identity,
        store = %genesis.store_identity,
        "Ledger ready"
    );

    // Create application state
    let state = Arc::new(AppState::new(ledger, config.event_page_size));

    // Create router
    let app = create_router(state);

    // Parse listen address
    let addr: SocketAddr = config.listen_addr.parse()?;

    info!(addr = %addr, "Starting HTTP server");

    // Create TCP listener
    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Run server with graceful shutdown
    if config.graceful_shutdown {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal(config.shutdown_timeout()))
            .await?;
    } else {
        axum::serve(listener, app).await?;
    }

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal(timeout: std::time::Duration) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!(timeout_secs = timeout.as_secs(), "Received shutdown signal, draining connections");

    // Force exit if in-flight requests outlive the timeout
    tokio::spawn(async move {
        tokio::time::sleep(timeout).await;
        tracing::warn!("Shutdown timeout elapsed, exiting");
        std::process::exit(1);
    });
}
