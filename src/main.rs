use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{AppState, router};
use clinic_core::{CoreConfig, config::store_kind_from_env_value, constants, open_store};

/// Main entry point for the clinic submissions service
///
/// Loads `.env`, resolves configuration once and serves the REST API until Ctrl-C.
///
/// # Environment Variables
/// - `CLINIC_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `CLINIC_DATA_DIR`: Directory for clinic data storage (default: "clinic_data")
/// - `CLINIC_STORE`: `file` (default) or `memory`
///
/// # Returns
/// * `Ok(())` - If the server starts and shuts down cleanly
/// * `Err(anyhow::Error)` - If configuration, startup or serving fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("clinic_run=info".parse()?)
                .add_directive("clinic_core=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var("CLINIC_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let data_dir = std::env::var("CLINIC_DATA_DIR")
        .unwrap_or_else(|_| constants::DEFAULT_CLINIC_DATA_DIR.into());
    let store_kind = store_kind_from_env_value(std::env::var("CLINIC_STORE").ok())?;

    let cfg = Arc::new(CoreConfig::new(PathBuf::from(&data_dir), store_kind)?);
    let store = open_store(&cfg)?;

    tracing::info!("++ Starting clinic REST on {}", rest_addr);
    tracing::info!("++ Using {:?} store at {}", store_kind, data_dir);

    let app = router(AppState::new(cfg, store));
    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("-- Clinic REST stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
