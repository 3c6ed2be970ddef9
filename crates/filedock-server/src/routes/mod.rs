pub mod attachments;
pub mod files;
pub mod system;

use std::sync::Arc;

use axum::{extract::DefaultBodyLimit, http::StatusCode, routing::get, Json, Router};
use filedock_service::{AttachmentService, ServiceError};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use system::SystemInfo;

pub struct InnerAppState {
    pub service: Arc<dyn AttachmentService>,
    pub system_info: SystemInfo,
    pub max_upload_bytes: usize,
}

pub type AppState = Arc<InnerAppState>;

pub fn build_router(state: AppState) -> Router {
    let body_limit = DefaultBodyLimit::max(state.max_upload_bytes);

    Router::new()
        .route("/", get(system::system_info).post(files::upload))
        .route("/system-info", get(system::system_info))
        .merge(attachments::routes())
        .merge(files::routes())
        .layer(body_limit)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub(crate) fn to_error(e: ServiceError) -> (StatusCode, Json<Value>) {
    let status = match &e {
        ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
        ServiceError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        ServiceError::Internal(_) => {
            tracing::error!("request failed: {e}");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, Json(json!({ "error": e.to_string() })))
}

pub(crate) fn bad_request(msg: impl Into<String>) -> (StatusCode, Json<Value>) {
    to_error(ServiceError::InvalidInput(msg.into()))
}
