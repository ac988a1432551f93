use std::sync::Arc;

use tokio::{net::TcpListener, signal};
use tracing_subscriber::EnvFilter;

use localspot_api::{
    config::Config,
    db::{create_pool, create_redis_client, Cache},
    routes::{create_router, AppState},
    services::{
        catalog::{postgres::PostgresCatalog, BusinessCatalog},
        surface::SurfaceService,
    },
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;
    tracing::info!(host = %config.host, port = config.port, "Starting localspot API");

    let db_pool = create_pool(&config.database_url, config.db_max_connections).await?;
    tracing::info!("Database connection pool initialized");

    sqlx::migrate!("./migrations").run(&db_pool).await?;
    tracing::info!("Database migrations applied");

    let redis_client = create_redis_client(&config.redis_url)?;
    let (cache, cache_writer) = Cache::new(redis_client).await;
    tracing::info!("Response cache initialized");

    let catalog: Arc<dyn BusinessCatalog> = Arc::new(PostgresCatalog::new(db_pool));
    let surface_service = SurfaceService::new(
        catalog,
        cache,
        config.candidate_pool_size,
        config.trending_bucket_minutes,
    );

    let addr = format!("{}:{}", config.host, config.port);
    let app = create_router(AppState {
        surface_service,
        config,
    });

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Flush any cache writes still queued before exiting.
    cache_writer.shutdown().await;
    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Waits for SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
