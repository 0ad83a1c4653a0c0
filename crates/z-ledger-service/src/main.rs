//! Z-Ledger Service - HTTP API for the virtual currency ledger
//!
//! This is the main entry point for the z-ledger service.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use z_ledger_service::{create_router, AppState, ServiceConfig};
use z_ledger_store::{RocksStore, StoreOptions};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,z_ledger=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Z-Ledger Service");

    // Load configuration from environment
    let config = ServiceConfig::from_env();

    tracing::info!(
        listen_addr = %config.listen_addr,
        data_dir = %config.data_dir,
        payout_configured = %config.payout.is_some(),
        payout_mode = ?config.payout_mode,
        admin_key_configured = %config.admin_api_key.is_some(),
        "Service configuration loaded"
    );

    // Initialize RocksDB store
    tracing::info!(path = %config.data_dir, "Opening RocksDB store");
    let options = StoreOptions {
        lock_timeout_ms: config.lock_timeout_ms,
    };
    let store = Arc::new(RocksStore::open_with_options(&config.data_dir, options)?);

    let state = AppState::new(store, config.clone());
    tracing::info!(
        payout_channel = state.has_payout(),
        "Application state initialized"
    );

    let app = create_router(state);
    tracing::info!("Router configured with all API endpoints");

    // Start HTTP server
    tracing::info!(listen_addr = %config.listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
