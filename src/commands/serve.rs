//! Serve command - Starts the HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;

use crate::api::{create_router, AppState};
use crate::cli::args::ServeArgs;
use crate::config::Config;
use crate::errors::{AppError, AppResult};
use crate::infra::{Cache, Database, HealthProbe, SupabaseClient};
use crate::shutdown::shutdown_signal;

/// Execute the serve command
pub async fn execute(args: ServeArgs, config: Arc<Config>) -> AppResult<()> {
    tracing::info!(
        environment = %config.environment,
        debug = config.debug,
        "Starting Plant Care API..."
    );

    // Redis backs rate limiting and the broker, so it is required.
    let cache = Cache::connect_with_retry(&config).await?;
    match cache.eviction_policy().await {
        Ok(Some(policy)) if policy == "noeviction" => {
            tracing::warn!("Redis maxmemory-policy is noeviction; cache writes will fail when memory is full")
        }
        Ok(_) => {}
        Err(e) => tracing::debug!(error = %e, "Could not read Redis eviction policy"),
    }

    let database = Database::connect(&config).await?;
    let supabase = SupabaseClient::new(&config)?;

    // Database and Supabase are probed, not required.
    for health in [database.check().await, supabase.check().await] {
        if health.is_healthy() {
            tracing::info!(service = %health.service, "Dependency reachable");
        } else {
            tracing::warn!(service = %health.service, error = ?health.error, "Dependency unreachable at startup");
        }
    }

    let state = AppState::from_infra(config.clone(), cache, database.clone(), supabase);
    let app = create_router(state);

    let addr = args.bind_addr(&config);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind to {}: {}", addr, e)))?;

    tracing::info!("Server running on http://{}", addr);
    if config.debug {
        tracing::info!("API docs at http://{}/docs", addr);
    }

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AppError::internal(format!("Server error: {}", e)))?;

    database.close().await?;
    tracing::info!("Server stopped.");
    Ok(())
}
