use async_trait::async_trait;
use filedock_core::{Attachment, AttachmentUpdate, Page, PageRequest, UploadCommand};
use filedock_store::ByteStream;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<filedock_core::CoreError> for ServiceError {
    fn from(e: filedock_core::CoreError) -> Self {
        match e {
            filedock_core::CoreError::InvalidInput(msg) => ServiceError::InvalidInput(msg),
        }
    }
}

impl From<filedock_db::DbError> for ServiceError {
    fn from(e: filedock_db::DbError) -> Self {
        match e {
            filedock_db::DbError::NotFound(msg) => ServiceError::NotFound(msg),
            other => ServiceError::Internal(other.to_string()),
        }
    }
}

impl From<filedock_store::StoreError> for ServiceError {
    fn from(e: filedock_store::StoreError) -> Self {
        ServiceError::Internal(e.to_string())
    }
}

/// A file body ready to be sent to a client.
pub struct Download {
    /// `name.ext` for the `Content-Disposition` header.
    pub file_name: String,
    /// Exact byte count of `body`.
    pub len: u64,
    pub body: ByteStream,
}

/// Abstraction over attachment storage.
///
/// The HTTP handlers program against this trait.
/// `LocalService` wraps the metadata database and the file root directly.
/// `HttpService` talks to a running filedock-server.
#[async_trait]
pub trait AttachmentService: Send + Sync {
    /// One attachment by id, `ServiceError::NotFound` if absent.
    async fn get(&self, id: &str) -> Result<Attachment, ServiceError>;

    /// A page of attachments, newest upload first.
    async fn find(&self, page: PageRequest) -> Result<Page<Attachment>, ServiceError>;

    /// Attachments belonging to a module (`puid`), optionally one `subgroup` of it.
    async fn find_by_module(
        &self,
        puid: &str,
        subgroup: Option<i16>,
    ) -> Result<Vec<Attachment>, ServiceError>;

    /// Persist a metadata record for a file already written under the file root.
    async fn create(&self, attachment: &Attachment) -> Result<Attachment, ServiceError>;

    /// Change name or grouping of an existing attachment. The stored file is untouched.
    async fn update(&self, id: &str, update: &AttachmentUpdate) -> Result<Attachment, ServiceError>;

    /// Write `body` to a fresh dated path and record it.
    async fn upload(
        &self,
        command: UploadCommand,
        body: ByteStream,
    ) -> Result<Attachment, ServiceError>;

    /// Resolve an attachment's bytes. A record whose file is gone is an internal error.
    async fn download(&self, id: &str) -> Result<Download, ServiceError>;

    /// Remove records and their files. Unknown ids are ignored.
    async fn delete(&self, ids: &[String]) -> Result<(), ServiceError>;
}
