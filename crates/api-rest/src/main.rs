//! Standalone REST API server binary.
//!
//! ## Purpose
//! Runs the REST API server on its own.
//!
//! ## Intended use
//! Useful for development and debugging against a throwaway store (`CLINIC_STORE=memory`). The
//! workspace's main `clinic-run` binary serves the same router.

use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{router, AppState};
use clinic_core::{config::store_kind_from_env_value, constants, open_store, CoreConfig};

/// Main entry point for the clinic REST API server
///
/// # Environment Variables
/// - `CLINIC_REST_ADDR`: Server address (default: "0.0.0.0:3000")
/// - `CLINIC_DATA_DIR`: Data directory for the file store (default: "clinic_data")
/// - `CLINIC_STORE`: `file` (default) or `memory`
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - the configuration is invalid or the store cannot be opened,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_rest=info".parse()?)
                .add_directive("clinic_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var("CLINIC_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let data_dir = std::env::var("CLINIC_DATA_DIR")
        .unwrap_or_else(|_| constants::DEFAULT_CLINIC_DATA_DIR.into());
    let store_kind = store_kind_from_env_value(std::env::var("CLINIC_STORE").ok())?;

    let cfg = Arc::new(CoreConfig::new(PathBuf::from(data_dir), store_kind)?);
    let store = open_store(&cfg)?;

    tracing::info!("-- Starting clinic REST API on {} ({:?} store)", addr, store_kind);

    let app = router(AppState::new(cfg, store));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
