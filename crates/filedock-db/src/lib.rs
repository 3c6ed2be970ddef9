pub mod sqlite;

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use filedock_core::{Attachment, AttachmentUpdate, Page, PageRequest};

pub use sqlite::SqliteDatabase;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Internal(String),
}

/// Where the metadata database lives.
#[derive(Debug, Clone, Default)]
pub struct DbConfig {
    /// Path to the SQLite file. `None` means `{data_dir}/filedock.db`.
    pub sqlite_path: Option<String>,
}

/// Attachment metadata persistence.
///
/// Implementations must be safe to share across request handlers.
#[async_trait]
pub trait Database: Send + Sync {
    /// Insert a new record. The id and path must both be unused.
    async fn insert_attachment(&self, attachment: &Attachment) -> Result<Attachment, DbError>;

    /// Fetch one record, `DbError::NotFound` if absent.
    async fn get_attachment(&self, id: &str) -> Result<Attachment, DbError>;

    /// A page of records, newest upload first.
    async fn find_attachments(&self, page: PageRequest) -> Result<Page<Attachment>, DbError>;

    /// Records for one `puid`, optionally narrowed to a `subgroup`, newest first.
    async fn find_attachments_by_module(
        &self,
        puid: &str,
        subgroup: Option<i16>,
    ) -> Result<Vec<Attachment>, DbError>;

    /// Apply the fields set in `update`, `DbError::NotFound` if absent.
    async fn update_attachment(
        &self,
        id: &str,
        update: &AttachmentUpdate,
    ) -> Result<Attachment, DbError>;

    /// Delete records by id, skipping unknown ids. Returns what was removed.
    async fn delete_attachments(&self, ids: &[String]) -> Result<Vec<Attachment>, DbError>;
}

/// `$XDG_DATA_HOME/filedock`, falling back to `~/.local/share/filedock`.
pub fn data_dir() -> PathBuf {
    let base = if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        PathBuf::from(xdg)
    } else if let Some(home) = std::env::var_os("HOME") {
        PathBuf::from(home).join(".local/share")
    } else {
        PathBuf::from(".")
    };
    base.join("filedock")
}
