use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use filedock_core::{AttachmentUpdate, PageRequest};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{bad_request, to_error, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/attachment", get(list_attachments))
        .route("/attachment/{id}", get(get_attachment).patch(update_attachment))
        .route("/parent/{puid}/{subgroup}", get(find_by_module))
}

#[derive(Debug, Deserialize)]
struct PageQuery {
    #[serde(rename = "page-no", default)]
    page_no: u32,
    #[serde(rename = "page-size", default = "default_page_size")]
    page_size: u32,
}

fn default_page_size() -> u32 {
    25
}

async fn get_attachment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    state
        .service
        .get(&id)
        .await
        .map(|a| Json(json!(a)))
        .map_err(to_error)
}

async fn update_attachment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<AttachmentUpdate>,
) -> Result<StatusCode, (StatusCode, Json<Value>)> {
    state
        .service
        .update(&id, &update)
        .await
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(to_error)
}

async fn list_attachments(
    State(state): State<AppState>,
    Query(q): Query<PageQuery>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let page = PageRequest::new(q.page_no, q.page_size).map_err(|e| to_error(e.into()))?;
    state
        .service
        .find(page)
        .await
        .map(|p| Json(json!(p)))
        .map_err(to_error)
}

async fn find_by_module(
    State(state): State<AppState>,
    Path((puid, subgroup)): Path<(String, String)>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let subgroup: i16 = subgroup
        .parse()
        .map_err(|_| bad_request(format!("subgroup must be a small integer, got {subgroup:?}")))?;
    state
        .service
        .find_by_module(&puid, Some(subgroup))
        .await
        .map(|rows| Json(json!(rows)))
        .map_err(to_error)
}
