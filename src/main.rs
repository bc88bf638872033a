//! Realms Snapshot API server
//!
//! Serves the snapshot sync pipeline over HTTP. Chain state comes from a
//! fixture-backed chain (`CHAIN_FIXTURE_PATH`) and artifacts are published
//! to a directory-backed storage pool (`STORAGE_ROOT`).

use realms_snapshot_api::config::Settings;
use realms_snapshot_api::routes::create_router;
use realms_snapshot_api::rpc::{ChainFixture, GovernanceRpc, InMemoryChain};
use realms_snapshot_api::state::AppState;
use realms_snapshot_api::storage::{LocalDirectoryStorage, StorageClient};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber for structured logging
    init_tracing();

    info!("🚀 Starting Realms Snapshot API...");

    // Load configuration
    let settings = Settings::load()?;
    info!("📋 Configuration loaded successfully");

    let rpc: Arc<dyn GovernanceRpc> = match &settings.chain.fixture_path {
        Some(path) => Arc::new(InMemoryChain::from_file(path).await?),
        None => {
            warn!("⚠️  CHAIN_FIXTURE_PATH not set, serving an empty chain");
            Arc::new(InMemoryChain::new(ChainFixture::default()))
        }
    };

    let storage: Arc<dyn StorageClient> = Arc::new(LocalDirectoryStorage::new(
        settings.storage.root.clone(),
        settings.storage.host.clone(),
    ));
    info!(
        "📦 Publishing to pool '{}' under {}",
        settings.storage.pool,
        settings.storage.root.display()
    );

    let state = Arc::new(
        AppState::new(rpc, storage, settings.sync_options())
            .with_job_retention(settings.sync.job_retention),
    );

    // Build the router
    let app = create_router(state.clone(), &settings);

    // Create socket address
    let addr = SocketAddr::from((settings.server.host, settings.server.port));

    info!("🌐 Server listening on http://{}", addr);
    info!("📚 API Endpoints:");
    info!("   GET    /health               - Health check");
    info!("   POST   /api/sync             - Start a snapshot sync");
    info!("   GET    /api/sync             - List sync jobs");
    info!("   GET    /api/sync/{{job_id}}    - Job progress and report");
    info!("   DELETE /api/sync/{{job_id}}    - Cancel a job");
    info!("   GET    /api/manifest         - Published lookup manifest");

    // Create TCP listener and serve
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.jobs.cancel_all().await;
    info!("👋 Server shutdown complete");
    Ok(())
}

/// Initialize tracing with structured logging
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,realms_snapshot_api=debug,tower_http=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .compact(),
        )
        .init();
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("📴 Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("📴 Received terminate signal, initiating graceful shutdown...");
        },
    }
}
