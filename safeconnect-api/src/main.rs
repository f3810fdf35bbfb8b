//! SafeConnect API Server Entry Point
//!
//! Bootstraps configuration, opens the journey store, recovers deadlines of
//! journeys that were active before the restart and starts the Axum server.

use std::net::SocketAddr;
use std::sync::Arc;

use safeconnect_api::constants::{DEFAULT_BIND_HOST, DEFAULT_PORT};
use safeconnect_api::telemetry::{init_tracing, LogConfig};
use safeconnect_api::{
    create_api_router, gateway_from_env, housekeeping_task, ApiConfig, ApiError, ApiResult,
    AppState, DispatchConfig, HousekeepingConfig, VerificationConfig,
};
use safeconnect_core::{Clock, SystemClock};
use safeconnect_storage::{DbConfig, InMemoryStore, JourneyStore, PgStore};
use tokio::sync::watch;

#[tokio::main]
async fn main() -> ApiResult<()> {
    init_tracing(&LogConfig::from_env())?;

    let store = open_store().await?;
    let gateway = gateway_from_env();
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let state = AppState::new(
        store.clone(),
        gateway,
        clock,
        DispatchConfig::from_env(),
        VerificationConfig::from_env(),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = state.engine.start(shutdown_rx.clone());

    match state.engine.recover(store.as_ref()).await {
        Ok(summary) => tracing::info!(
            scanned = summary.scanned,
            scheduled = summary.scheduled,
            fired = summary.fired,
            "Startup recovery scan finished"
        ),
        Err(e) => tracing::error!(
            error = %e,
            "Startup recovery scan failed, housekeeping will retry"
        ),
    }

    let housekeeping = tokio::spawn(housekeeping_task(
        state.engine.clone(),
        store.clone(),
        state.verification.clone(),
        HousekeepingConfig::from_env(),
        shutdown_rx,
    ));

    let api_config = ApiConfig::from_env();
    let app = create_api_router(state, &api_config);

    let addr = resolve_bind_addr()?;
    tracing::info!(%addr, "Starting SafeConnect API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Cannot listen for shutdown signal");
        }
        tracing::info!("Shutdown signal received");
    })
    .await
    .map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;

    let _ = shutdown_tx.send(true);
    if let Err(e) = scheduler.await {
        tracing::error!(error = %e, "Escalation scheduler ended abnormally");
    }
    if let Err(e) = housekeeping.await {
        tracing::error!(error = %e, "Housekeeping task ended abnormally");
    }
    Ok(())
}

/// Open the store selected by `SAFECONNECT_STORE` (`memory` or `postgres`).
async fn open_store() -> ApiResult<Arc<dyn JourneyStore>> {
    let kind = std::env::var("SAFECONNECT_STORE").unwrap_or_else(|_| "memory".to_string());
    match kind.to_lowercase().as_str() {
        "memory" => {
            tracing::warn!("Using in-memory store, data is lost on restart");
            Ok(Arc::new(InMemoryStore::new()))
        }
        "postgres" | "postgresql" => {
            let store = PgStore::from_config(&DbConfig::from_env())?;
            store.migrate().await?;
            tracing::info!("PostgreSQL store ready");
            Ok(Arc::new(store))
        }
        other => Err(ApiError::invalid_input(format!(
            "Unknown SAFECONNECT_STORE value: {} (expected memory or postgres)",
            other
        ))),
    }
}

fn resolve_bind_addr() -> ApiResult<SocketAddr> {
    let host =
        std::env::var("SAFECONNECT_API_BIND").unwrap_or_else(|_| DEFAULT_BIND_HOST.to_string());
    let port = match std::env::var("PORT")
        .ok()
        .or_else(|| std::env::var("SAFECONNECT_API_PORT").ok())
    {
        Some(port_str) => port_str
            .parse::<u16>()
            .map_err(|_| ApiError::invalid_input(format!("Invalid port value: {}", port_str)))?,
        None => DEFAULT_PORT,
    };

    let addr = format!("{}:{}", host, port);
    addr.parse::<SocketAddr>()
        .map_err(|e| ApiError::invalid_input(format!("Invalid bind address {}: {}", addr, e)))
}
