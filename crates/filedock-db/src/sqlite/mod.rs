pub(crate) mod migrations;
pub mod queries;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::Connection;

use filedock_core::{Attachment, AttachmentUpdate, Page, PageRequest};

use crate::{Database, DbConfig, DbError};

/// Converts `rusqlite::Result<T>` into `Result<T, DbError>` via `.to_db()?`.
pub(crate) trait SqliteResultExt<T> {
    fn to_db(self) -> Result<T, DbError>;
}

impl<T> SqliteResultExt<T> for rusqlite::Result<T> {
    fn to_db(self) -> Result<T, DbError> {
        self.map_err(map_sqlite_err)
    }
}

#[derive(Clone)]
pub struct SqliteDatabase {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteDatabase {
    pub fn open(config: &DbConfig) -> Result<Self, DbError> {
        let path = config
            .sqlite_path
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(|| crate::data_dir().join("filedock.db"));
        std::fs::create_dir_all(path.parent().unwrap_or(Path::new(".")))?;
        Self::open_path(&path)
    }

    pub fn open_path(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path).to_db()?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA busy_timeout=5000;",
        )
        .to_db()?;
        tracing::debug!(path = %path.display(), "opened sqlite database");
        Self::with_migrations(conn)
    }

    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory().to_db()?;
        Self::with_migrations(conn)
    }

    fn with_migrations(conn: Connection) -> Result<Self, DbError> {
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.with_conn(migrations::run)?;
        Ok(db)
    }

    pub(crate) fn with_conn<F, T>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&Connection) -> Result<T, DbError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|_| DbError::Internal("lock poisoned".into()))?;
        f(&conn)
    }

    /// Run a sync query on the blocking pool.
    async fn blocking<F, T>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&SqliteDatabase) -> Result<T, DbError> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| DbError::Internal(e.to_string()))?
    }
}

pub(crate) fn map_sqlite_err(e: rusqlite::Error) -> DbError {
    DbError::Internal(e.to_string())
}

#[async_trait]
impl Database for SqliteDatabase {
    async fn insert_attachment(&self, attachment: &Attachment) -> Result<Attachment, DbError> {
        let attachment = attachment.clone();
        self.blocking(move |db| db.insert_attachment_sync(&attachment))
            .await
    }

    async fn get_attachment(&self, id: &str) -> Result<Attachment, DbError> {
        let id = id.to_string();
        self.blocking(move |db| db.get_attachment_sync(&id)).await
    }

    async fn find_attachments(&self, page: PageRequest) -> Result<Page<Attachment>, DbError> {
        self.blocking(move |db| db.find_attachments_sync(page)).await
    }

    async fn find_attachments_by_module(
        &self,
        puid: &str,
        subgroup: Option<i16>,
    ) -> Result<Vec<Attachment>, DbError> {
        let puid = puid.to_string();
        self.blocking(move |db| db.find_attachments_by_module_sync(&puid, subgroup))
            .await
    }

    async fn update_attachment(
        &self,
        id: &str,
        update: &AttachmentUpdate,
    ) -> Result<Attachment, DbError> {
        let id = id.to_string();
        let update = update.clone();
        self.blocking(move |db| db.update_attachment_sync(&id, &update))
            .await
    }

    async fn delete_attachments(&self, ids: &[String]) -> Result<Vec<Attachment>, DbError> {
        let ids = ids.to_vec();
        self.blocking(move |db| db.delete_attachments_sync(&ids)).await
    }
}
