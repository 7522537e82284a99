use std::sync::Arc;

use tvsync_api::{app_router, AppConfig, AppState, FileKvStore, KvStore, MemoryKvStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Only load .env in development; production uses platform-native env injection.
    #[cfg(debug_assertions)]
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tvsync_api=info".parse()?),
        )
        .init();

    let config = Arc::new(AppConfig::from_env()?);
    tracing::info!("Starting tvsync-api with config: {:?}", config);

    match config.store_dir.clone() {
        Some(dir) => {
            tracing::info!(dir = %dir.display(), "Using file-backed store");
            serve(config, FileKvStore::open(dir).await?).await
        }
        None => {
            tracing::warn!("TVSYNC_STORE_DIR not set, data is kept in memory only");
            serve(config, MemoryKvStore::new()).await
        }
    }
}

async fn serve<S: KvStore>(
    config: Arc<AppConfig>,
    store: S,
) -> Result<(), Box<dyn std::error::Error>> {
    let bind_addr = config.bind_addr.clone();
    let router = app_router(AppState::new(config, store));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("tvsync-api listening on {}", bind_addr);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("tvsync-api stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(%error, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
