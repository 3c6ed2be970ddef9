use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use filedock_service::{AttachmentService, LocalService};
use filedock_store::StoreConfig;
use tokio::net::TcpListener;

use crate::routes::{build_router, InnerAppState, SystemInfo};

const TEST_UPLOAD_LIMIT: usize = 8 * 1024 * 1024;

/// A router over in-memory SQLite and a temporary file root.
pub struct TestApp {
    pub router: Router,
    pub service: Arc<dyn AttachmentService>,
    pub file_root: PathBuf,
    _tmp: tempfile::TempDir,
}

/// Build a test app with in-memory SQLite and a fresh temp directory as the file root.
pub fn test_app() -> TestApp {
    let tmp = tempfile::tempdir().unwrap();
    let file_root = tmp.path().join("files");
    let db = Arc::new(filedock_db::SqliteDatabase::open_in_memory().unwrap());
    let store = filedock_store::create_store(&StoreConfig {
        file_root: file_root.to_string_lossy().to_string(),
    })
    .unwrap();
    let service: Arc<dyn AttachmentService> = Arc::new(LocalService::new(db, store, "filedock"));
    let state = Arc::new(InnerAppState {
        service: service.clone(),
        system_info: SystemInfo::capture(),
        max_upload_bytes: TEST_UPLOAD_LIMIT,
    });
    TestApp {
        router: build_router(state),
        service,
        file_root,
        _tmp: tmp,
    }
}

/// A running test server with base_url and background task handle.
pub struct TestServer {
    pub base_url: String,
    pub file_root: PathBuf,
    _tmp: tempfile::TempDir,
    _handle: tokio::task::JoinHandle<()>,
}

/// Spawn an axum test server on a random port. Returns the TestServer
/// with the `base_url` (e.g. "http://127.0.0.1:12345").
pub async fn spawn_test_server() -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let base_url = format!("http://{addr}");
    let TestApp {
        router,
        file_root,
        _tmp,
        ..
    } = test_app();
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    TestServer {
        base_url,
        file_root,
        _tmp,
        _handle: handle,
    }
}
