//! tally-server: the Tally HTTP API.
//!
//! One Tokio runtime, one SQLite connection shared behind a mutex, one axum
//! listener. Stops on Ctrl-C after in-flight requests finish.

use tally_server::{router, AppState, ServerConfig};
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load config
    let config = ServerConfig::load()?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("tally={}", config.logging.level).parse()?),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "Tally server starting");

    // 2. Open database
    let data_dir = config.data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let db_path = config.db_path();
    let conn = tally_db::open(&db_path)?;
    info!(path = %db_path.display(), "database opened");

    // 3. Build state and router
    let state = AppState::from_config(&config, conn)?;
    if !config.cache.enabled {
        warn!("cache disabled, every lookup goes to the database");
    }
    let app = router(state, &config.server.cors_origins);

    // 4. Serve until Ctrl-C
    let listener = TcpListener::bind(&config.server.bind).await?;
    info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Tally server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Ctrl-C received, shutting down");
}
