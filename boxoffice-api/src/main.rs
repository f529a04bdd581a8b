use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use boxoffice_api::{app, AppState, AuthConfig};
use boxoffice_core::InventoryService;
use boxoffice_store::{app_config::Config, DbClient, SqliteInventoryStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "boxoffice_api=debug,boxoffice_core=debug,boxoffice_store=info,tower_http=debug,axum::rejection=trace".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting boxoffice API on port {}", config.server.port);

    // Shared inventory database
    let db = DbClient::new(&config.database)
        .await
        .context("Failed to open inventory database")?;
    db.migrate().await.context("Failed to run migrations")?;

    let store = Arc::new(SqliteInventoryStore::new(db.pool.clone()));
    let inventory = InventoryService::new(store, config.reservation.retry_policy());

    let app_state = AppState::new(
        inventory,
        AuthConfig {
            secret: config.auth.jwt_secret.clone(),
        },
        &config.api,
    )
    .context("Failed to register metrics")?;

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutdown signal received");
}
