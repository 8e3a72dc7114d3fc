/// Server setup and initialization
///
/// Wires together storage, the published-filter registry, the session store,
/// the edit controller and the HTTP routes.

use crate::{
    api::{create_filter_routes, create_session_routes, AppState},
    config::Config,
    controller::{ConfigAccessPolicy, FilterController},
    filter::{FilterRegistry, FilterStorage},
    session::SessionStore,
};
use anyhow::Result;
use axum::{routing::get, Router};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool};
use std::{str::FromStr, sync::Arc, time::Duration};
use tokio::net::TcpListener;

/// Open the filter database described by the configuration
pub async fn connect_database(config: &Config) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&config.database.url)
        .map_err(|e| anyhow::anyhow!("Invalid database URL '{}': {}", config.database.url, e))?
        .create_if_missing(true);

    if let Some(parent) = options.get_filename().parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| anyhow::anyhow!("Failed to create data directory '{}': {}", parent.display(), e))?;
    }

    Ok(SqlitePool::connect_with(options).await?)
}

/// Create the main Axum application on an existing pool
pub async fn create_app_with_pool(config: Config, pool: SqlitePool) -> Result<(Router, AppState)> {
    tracing::info!("Initializing filter storage");
    let storage = FilterStorage::new(pool);
    storage
        .init_schema()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to initialize filter schema: {}", e))?;

    tracing::info!("Loading published filters into registry");
    let registry = Arc::new(FilterRegistry::new(storage.clone()));
    registry
        .init_from_storage()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to load filters from storage: {}", e))?;

    let sessions = Arc::new(SessionStore::new(config.edit.session_lifetime_secs));
    let access = Arc::new(ConfigAccessPolicy::new(&config.access));

    let controller = FilterController::new(
        Arc::new(storage.clone()),
        sessions.clone(),
        sessions.clone(),
        access,
        config.edit.clone(),
    )
    .with_post_save_hook(registry.clone());

    let state = AppState {
        controller,
        storage,
        registry,
        sessions,
    };

    let app = Router::new()
        .route("/healthz", get(health_check))
        .merge(create_session_routes())
        .merge(create_filter_routes())
        .with_state(state.clone());

    tracing::info!("Application initialized successfully");

    Ok((app, state))
}

/// Create the main Axum application from configuration
pub async fn create_app(config: Config) -> Result<Router> {
    let pool = connect_database(&config).await?;
    let (app, state) = create_app_with_pool(config, pool).await?;

    // Idle sessions and stale permits are swept periodically
    let sessions = state.sessions.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(60));
        loop {
            ticker.tick().await;
            sessions.sweep_expired().await;
            tracing::debug!("{} edit sessions open", sessions.session_count().await);
        }
    });

    Ok(app)
}

/// Start the HTTP server with the given configuration
pub async fn start_server(config: Config) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .init();

    tracing::info!("Starting filterdesk server...");

    let app = create_app(config.clone()).await?;

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&bind_addr).await?;

    tracing::info!("Server listening on http://{}", bind_addr);

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

/// Health check endpoint handler
async fn health_check() -> &'static str {
    "ok"
}
