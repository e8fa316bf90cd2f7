//! rubric-server entry point.

use anyhow::{Context, Result};
use rubric_common::config::{config_path, Config};
use rubric_common::logging::init_logging;
use rubric_server::{build_router, AppState};
use rubric_session::{create_store, MemoryStore, RemoteStore, SessionStore};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[tokio::main]
async fn main() -> Result<()> {
    let startup_start = std::time::Instant::now();

    let config = Config::load_with_env()?;
    init_logging(
        &config.observability.log_level,
        &config.observability.log_format,
        &config.observability.excluded_targets,
    );

    tracing::info!("Rubric Server v{}", env!("CARGO_PKG_VERSION"));

    let config_file = config_path();
    tracing::info!(
        path = %config_file.display(),
        found = config_file.exists(),
        "Configuration loaded"
    );
    for warning in &config.load_warnings {
        tracing::warn!("{warning}");
    }

    let remote: Arc<dyn RemoteStore> = match create_store(&config.store).await {
        Ok(store) => store,
        Err(e) => {
            tracing::warn!(
                backend = %config.store.backend,
                error = %e,
                "Remote store unavailable, session state will be kept in memory only"
            );
            Arc::new(MemoryStore::new())
        }
    };
    tracing::info!(backend = remote.name(), "Remote store configured");

    let session = SessionStore::new(remote, &config.store.key_prefix);

    tokio::fs::create_dir_all(&config.storage.upload_dir)
        .await
        .with_context(|| {
            format!(
                "Failed to create upload directory {}",
                config.storage.upload_dir.display()
            )
        })?;

    let addr = config.listen_addr();
    let state = AppState::new(session, config);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = build_router(state).layer(cors);

    let startup_duration = startup_start.elapsed();
    tracing::info!(
        duration_ms = startup_duration.as_millis() as u64,
        "Service initialized in {:?}",
        startup_duration
    );

    tracing::info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
