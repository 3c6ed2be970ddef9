use async_trait::async_trait;
use filedock_core::{Attachment, AttachmentUpdate, Page, PageRequest, UploadCommand};
use filedock_store::ByteStream;
use futures::{StreamExt, TryStreamExt};
use reqwest::header::{CONTENT_DISPOSITION, LOCATION};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode, Url};

use crate::{AttachmentService, Download, ServiceError};

/// Async HTTP client implementation of AttachmentService.
/// Connects to a running filedock-server.
pub struct HttpService {
    base_url: String,
    client: Client,
}

impl HttpService {
    pub fn new(base_url: &str) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        Self {
            base_url,
            client: Client::new(),
        }
    }

    /// Fetch the server's system info document.
    pub async fn system_info(&self) -> Result<serde_json::Value, ServiceError> {
        self.get_json(self.url(&[])?).await
    }

    /// `{base_url}/{segments}` with each segment percent-encoded.
    fn url(&self, segments: &[&str]) -> Result<Url, ServiceError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ServiceError::InvalidInput(format!("bad base url {}: {e}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|_| ServiceError::InvalidInput(format!("not a base url: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T, ServiceError> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ServiceError::Internal(format!("connection failed: {e}")))?;
        handle_response(resp).await
    }
}

async fn handle_response<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, ServiceError> {
    let status = resp.status();
    if status.is_success() {
        resp.json::<T>()
            .await
            .map_err(|e| ServiceError::Internal(format!("json decode: {e}")))
    } else {
        Err(parse_error_with_status(status, resp).await)
    }
}

async fn parse_error_with_status(status: StatusCode, resp: reqwest::Response) -> ServiceError {
    let body = resp.text().await.unwrap_or_default();
    let msg = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v["error"].as_str().map(String::from))
        .unwrap_or(body);

    if status == StatusCode::NOT_FOUND {
        ServiceError::NotFound(msg)
    } else if status == StatusCode::BAD_REQUEST {
        ServiceError::InvalidInput(msg)
    } else {
        ServiceError::Internal(msg)
    }
}

/// Pull `filename="..."` out of a Content-Disposition value.
fn disposition_file_name(value: &[u8]) -> Option<String> {
    let value = String::from_utf8_lossy(value);
    let start = value.find("filename=\"")? + "filename=\"".len();
    let mut out = String::new();
    let mut chars = value[start..].chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.push(chars.next()?),
            '"' => return Some(out),
            c => out.push(c),
        }
    }
    None
}

#[async_trait]
impl AttachmentService for HttpService {
    async fn get(&self, id: &str) -> Result<Attachment, ServiceError> {
        self.get_json(self.url(&["attachment", id])?).await
    }

    async fn find(&self, page: PageRequest) -> Result<Page<Attachment>, ServiceError> {
        let mut url = self.url(&["attachment"])?;
        url.query_pairs_mut()
            .append_pair("page-no", &page.page_no.to_string())
            .append_pair("page-size", &page.page_size.to_string());
        self.get_json(url).await
    }

    async fn find_by_module(
        &self,
        puid: &str,
        subgroup: Option<i16>,
    ) -> Result<Vec<Attachment>, ServiceError> {
        let subgroup = subgroup.ok_or_else(|| {
            ServiceError::InvalidInput("subgroup is required for module lookup over http".into())
        })?;
        self.get_json(self.url(&["parent", puid, &subgroup.to_string()])?)
            .await
    }

    async fn create(&self, _attachment: &Attachment) -> Result<Attachment, ServiceError> {
        Err(ServiceError::InvalidInput(
            "metadata-only create is not exposed over http; use upload".into(),
        ))
    }

    async fn update(&self, id: &str, update: &AttachmentUpdate) -> Result<Attachment, ServiceError> {
        let resp = self
            .client
            .patch(self.url(&["attachment", id])?)
            .json(update)
            .send()
            .await
            .map_err(|e| ServiceError::Internal(e.to_string()))?;
        let status = resp.status();
        if status != StatusCode::NO_CONTENT {
            return Err(parse_error_with_status(status, resp).await);
        }
        self.get(id).await
    }

    async fn upload(
        &self,
        command: UploadCommand,
        body: ByteStream,
    ) -> Result<Attachment, ServiceError> {
        let mut form = Form::new();
        if let Some(puid) = command.puid {
            form = form.text("puid", puid);
        }
        if let Some(subgroup) = command.subgroup {
            form = form.text("subgroup", subgroup.to_string());
        }
        let part = Part::stream(reqwest::Body::wrap_stream(body)).file_name(command.file_name);
        form = form.part("fileData", part);

        let resp = self
            .client
            .post(self.url(&[])?)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ServiceError::Internal(e.to_string()))?;
        let status = resp.status();
        if status != StatusCode::NO_CONTENT {
            return Err(parse_error_with_status(status, resp).await);
        }

        let location = resp
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ServiceError::Internal("upload response without Location".into()))?;
        let id = self
            .url(&[])?
            .join(location)
            .ok()
            .and_then(|u| u.path_segments().and_then(|mut s| s.next_back().map(String::from)))
            .ok_or_else(|| ServiceError::Internal(format!("bad Location: {location}")))?;
        self.get(&id).await
    }

    async fn download(&self, id: &str) -> Result<Download, ServiceError> {
        let resp = self
            .client
            .get(self.url(&[id])?)
            .send()
            .await
            .map_err(|e| ServiceError::Internal(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(parse_error_with_status(status, resp).await);
        }

        let file_name = resp
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| disposition_file_name(v.as_bytes()))
            .unwrap_or_else(|| id.to_string());
        let len = resp
            .content_length()
            .ok_or_else(|| ServiceError::Internal("download without Content-Length".into()))?;
        let body = resp.bytes_stream().map_err(std::io::Error::other).boxed();
        Ok(Download {
            file_name,
            len,
            body,
        })
    }

    async fn delete(&self, ids: &[String]) -> Result<(), ServiceError> {
        if ids.is_empty() {
            return Ok(());
        }
        let resp = self
            .client
            .delete(self.url(&[&ids.join(",")])?)
            .send()
            .await
            .map_err(|e| ServiceError::Internal(e.to_string()))?;
        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(parse_error_with_status(status, resp).await)
        }
    }
}
