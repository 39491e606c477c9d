pub mod address;
pub mod builder;
pub mod cli;
pub mod config;
pub mod errors;
pub mod flight;
pub mod formula;
pub mod logging;
pub mod mapping;
pub mod selector;
pub mod server;
pub mod snapshot;
pub mod state;
pub mod store;

pub use builder::{Snapshot, build_snapshot};
pub use config::{CliArgs, LogFormat, ServerConfig, StoreKind};
pub use errors::{ErrorCategory, MappingError, SnapshotError, StoreError};
pub use logging::init_logging;
pub use mapping::{CellSource, ColumnMapping, ColumnSpec, Layout};
pub use selector::{DatePattern, select_reference_sheet};
pub use snapshot::{SnapshotOptions, SnapshotReport, SnapshotService, WriteMode};
pub use state::AppState;
pub use store::{InMemoryStore, SheetStore};

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;

pub async fn run_server(config: ServerConfig) -> Result<()> {
    let config = Arc::new(config);
    let state = Arc::new(AppState::new(config.clone())?);

    tracing::info!(
        spreadsheet_id = %config.spreadsheet_id,
        store = state.service().store_name(),
        layout = %config.layout,
        write_mode = %config.write_mode,
        bind = %config.http_bind_address,
        "starting sheet rollover server",
    );

    let app = server::router(state);
    let listener = TcpListener::bind(config.http_bind_address)
        .await
        .with_context(|| format!("failed to bind {}", config.http_bind_address))?;
    let actual_addr = listener.local_addr()?;
    tracing::info!(
        bind = %actual_addr,
        trigger = %config.trigger_path,
        status = %config.status_path,
        "listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(error) = tokio::signal::ctrl_c().await {
                tracing::warn!(?error, "failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            tracing::info!("shutdown signal received");
        })
        .await
        .context("http server failed")?;

    tracing::info!("server stopped");
    Ok(())
}
