use std::io;

use axum::{
    body::Body,
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use bytes::Bytes;
use filedock_core::{Attachment, AttachmentUpdate, UploadCommand};
use filedock_service::ServiceError;
use futures::{channel::mpsc, SinkExt, StreamExt};
use serde_json::{json, Value};
use tracing::warn;

use super::{bad_request, to_error, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/{id}", get(download).delete(delete_attachments))
        .route("/inline/{id}", get(inline))
}

const FILE_FIELD: &str = "fileData";

type Rejection = (StatusCode, Json<Value>);

fn multipart_error(e: MultipartError) -> Rejection {
    (e.status(), Json(json!({ "error": e.body_text() })))
}

fn parse_subgroup(text: &str) -> Result<Option<i16>, Rejection> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    text.parse::<i16>()
        .map(Some)
        .map_err(|_| bad_request(format!("subgroup must be a small integer, got {text:?}")))
}

#[derive(Default)]
struct UploadForm {
    /// Grouping read before the file part.
    grouping: AttachmentUpdate,
    /// Grouping read after the file was stored.
    late: AttachmentUpdate,
    stored: Option<Attachment>,
}

impl UploadForm {
    fn grouping_mut(&mut self) -> &mut AttachmentUpdate {
        if self.stored.is_some() {
            &mut self.late
        } else {
            &mut self.grouping
        }
    }
}

/// Accepts `multipart/form-data` with a `fileData` file part and optional
/// `puid` and `subgroup` text parts in any order. The file streams to disk
/// as it arrives; grouping sent after it is applied before the reply.
pub(super) async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response, Rejection> {
    let mut form = UploadForm::default();
    let read = read_form(&state, &mut multipart, &mut form).await;

    let Some(attachment) = form.stored else {
        read?;
        return Err(bad_request(format!("missing {FILE_FIELD} part")));
    };
    if let Err(rejected) = read {
        discard(&state, &attachment.id).await;
        return Err(rejected);
    }
    if !form.late.is_empty() {
        if let Err(e) = state.service.update(&attachment.id, &form.late).await {
            discard(&state, &attachment.id).await;
            return Err(to_error(e));
        }
    }

    Ok((
        StatusCode::NO_CONTENT,
        [(header::LOCATION, format!("/{}", attachment.id))],
    )
        .into_response())
}

async fn read_form(
    state: &AppState,
    multipart: &mut Multipart,
    form: &mut UploadForm,
) -> Result<(), Rejection> {
    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("puid") => {
                let text = field.text().await.map_err(multipart_error)?;
                if !text.is_empty() {
                    form.grouping_mut().puid = Some(text);
                }
            }
            Some("subgroup") => {
                let text = field.text().await.map_err(multipart_error)?;
                if let Some(value) = parse_subgroup(&text)? {
                    form.grouping_mut().subgroup = Some(value);
                }
            }
            Some(FILE_FIELD) if form.stored.is_none() => {
                let command = UploadCommand {
                    file_name: field.file_name().unwrap_or_default().to_string(),
                    puid: form.grouping.puid.clone(),
                    subgroup: form.grouping.subgroup,
                    uploader: None,
                };

                let (mut tx, rx) = mpsc::channel::<Result<Bytes, io::Error>>(8);
                let pump = async move {
                    loop {
                        match field.chunk().await {
                            Ok(Some(chunk)) => {
                                if tx.send(Ok(chunk)).await.is_err() {
                                    return None;
                                }
                            }
                            Ok(None) => return None,
                            Err(e) => {
                                let msg = e.body_text();
                                let _ = tx.send(Err(io::Error::other(msg))).await;
                                return Some(multipart_error(e));
                            }
                        }
                    }
                };
                let (rejected, result) =
                    tokio::join!(pump, state.service.upload(command, rx.boxed()));
                match (rejected, result) {
                    (None, Ok(stored)) => form.stored = Some(stored),
                    (Some(rejected), Ok(stored)) => {
                        form.stored = Some(stored);
                        return Err(rejected);
                    }
                    (Some(rejected), Err(_)) => return Err(rejected),
                    (None, Err(e)) => return Err(to_error(e)),
                }
            }
            Some(FILE_FIELD) => warn!("ignoring repeated {FILE_FIELD} part"),
            other => warn!(field = ?other, "ignoring unexpected multipart field"),
        }
    }
    Ok(())
}

/// Drop an upload whose form turned out to be unusable.
async fn discard(state: &AppState, id: &str) {
    if let Err(e) = state.service.delete(&[id.to_string()]).await {
        warn!(id, "failed to discard upload: {e}");
    }
}

async fn download(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, Rejection> {
    send_file(&state, &id, "attachment").await
}

async fn inline(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, Rejection> {
    send_file(&state, &id, "inline").await
}

async fn send_file(state: &AppState, id: &str, disposition: &str) -> Result<Response, Rejection> {
    let file = state.service.download(id).await.map_err(to_error)?;
    let disposition = content_disposition(disposition, &file.file_name)
        .map_err(|e| to_error(ServiceError::Internal(e.to_string())))?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(header::CONTENT_LENGTH, file.len)
        .header(header::CONTENT_DISPOSITION, disposition)
        .body(Body::from_stream(file.body))
        .map_err(|e| to_error(ServiceError::Internal(e.to_string())))
}

/// `<disposition>; filename="<name>"` with the raw UTF-8 name. Quotes and
/// backslashes are escaped; control characters become `_`.
fn content_disposition(
    disposition: &str,
    file_name: &str,
) -> Result<HeaderValue, header::InvalidHeaderValue> {
    let mut value = String::with_capacity(file_name.len() + 24);
    value.push_str(disposition);
    value.push_str("; filename=\"");
    for c in file_name.chars() {
        match c {
            '"' | '\\' => {
                value.push('\\');
                value.push(c);
            }
            c if c.is_control() => value.push('_'),
            c => value.push(c),
        }
    }
    value.push('"');
    HeaderValue::from_bytes(value.as_bytes())
}

async fn delete_attachments(
    State(state): State<AppState>,
    Path(ids): Path<String>,
) -> Result<StatusCode, Rejection> {
    let ids: Vec<String> = ids
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect();
    state
        .service
        .delete(&ids)
        .await
        .map(|_| StatusCode::NO_CONTENT)
        .map_err(to_error)
}
