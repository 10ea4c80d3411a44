//! Tech Check - Main Entry Point

use std::net::SocketAddr;
use std::sync::Arc;

use tech_check_backend::{
    api::{self, AppState},
    config::Config,
    db,
    error::Result,
    services::{
        identity_service::{GoogleIdentityVerifier, IdentityVerifier},
        summarizer::PlaceholderSummarizer,
        worker_pool::WorkerPool,
        Services,
    },
    telemetry,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Arc::new(Config::from_env()?);
    telemetry::init_tracing(&config.log_format);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        store = ?config.store_backend,
        "Starting Tech Check"
    );

    let stores = db::connect_stores(&config).await?;
    let worker_pool = Arc::new(WorkerPool::new(config.worker_pool_count));

    let identity: Option<Arc<dyn IdentityVerifier>> = match &config.google_client_id {
        Some(client_id) => Some(Arc::new(GoogleIdentityVerifier::new(
            client_id.clone(),
            config.google_tokeninfo_url.clone(),
        )?)),
        None => {
            tracing::info!("GOOGLE_CLIENT_ID not set; external login disabled");
            None
        }
    };

    let services = Services::new(
        config.clone(),
        &stores,
        worker_pool.clone(),
        identity,
        Arc::new(PlaceholderSummarizer),
    );
    let state = Arc::new(AppState::new(config.clone(), services));
    let app = api::routes::create_router(state);

    // Start server
    let addr: SocketAddr = config.bind_address.parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Draining background tasks");
    worker_pool.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
