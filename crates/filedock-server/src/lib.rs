pub mod config;
mod routes;
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

use std::sync::Arc;

use anyhow::Result;
use filedock_db::SqliteDatabase;
use filedock_service::LocalService;
use tokio::net::TcpListener;
use tracing::info;

use config::ServerConfig;

pub use routes::{build_router, AppState, InnerAppState, SystemInfo};

pub async fn serve(listener: TcpListener, config: &ServerConfig) -> Result<()> {
    let db = Arc::new(SqliteDatabase::open(&config.db_config())?);
    let store = filedock_store::create_store(&config.store_config())?;
    let service = LocalService::new(db, store, &config.uploader);
    info!(file_root = %config.file_root().display(), "file store ready");

    let state = Arc::new(InnerAppState {
        service: Arc::new(service),
        system_info: SystemInfo::capture(),
        max_upload_bytes: config.max_upload_bytes,
    });
    axum::serve(listener, build_router(state)).await?;
    Ok(())
}
