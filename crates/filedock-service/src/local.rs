use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use filedock_core::{
    split_file_name, Attachment, AttachmentUpdate, Page, PageRequest, UploadCommand, UploadPath,
};
use filedock_db::Database;
use filedock_store::{BlobStore, ByteStream, StoreError};
use tracing::{info, warn};

use crate::{AttachmentService, Download, ServiceError};

/// Local implementation backed by the metadata database and the file root.
#[derive(Clone)]
pub struct LocalService {
    db: Arc<dyn Database>,
    store: Arc<dyn BlobStore>,
    default_uploader: String,
}

impl LocalService {
    pub fn new(db: Arc<dyn Database>, store: Arc<dyn BlobStore>, default_uploader: &str) -> Self {
        Self {
            db,
            store,
            default_uploader: default_uploader.to_string(),
        }
    }

    /// Mint a new attachment id.
    pub fn new_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    /// Remove a file whose record will never be written.
    async fn discard_file(&self, key: &str) {
        if let Err(e) = self.store.delete(key).await {
            warn!(key, "failed to remove orphaned upload: {e}");
        }
    }
}

#[async_trait]
impl AttachmentService for LocalService {
    async fn get(&self, id: &str) -> Result<Attachment, ServiceError> {
        Ok(self.db.get_attachment(id).await?)
    }

    async fn find(&self, page: PageRequest) -> Result<Page<Attachment>, ServiceError> {
        Ok(self.db.find_attachments(page).await?)
    }

    async fn find_by_module(
        &self,
        puid: &str,
        subgroup: Option<i16>,
    ) -> Result<Vec<Attachment>, ServiceError> {
        Ok(self.db.find_attachments_by_module(puid, subgroup).await?)
    }

    async fn create(&self, attachment: &Attachment) -> Result<Attachment, ServiceError> {
        Ok(self.db.insert_attachment(attachment).await?)
    }

    async fn update(&self, id: &str, update: &AttachmentUpdate) -> Result<Attachment, ServiceError> {
        update.validate()?;
        let updated = self.db.update_attachment(id, update).await?;
        info!(id, "updated attachment");
        Ok(updated)
    }

    async fn upload(
        &self,
        command: UploadCommand,
        body: ByteStream,
    ) -> Result<Attachment, ServiceError> {
        if command.file_name.is_empty() {
            return Err(ServiceError::InvalidInput("missing file name".into()));
        }
        let id = Self::new_id();
        let now = Utc::now();
        let (name, ext) = split_file_name(&command.file_name);
        let key = UploadPath::new(now, &id, ext).relative();

        let written = self.store.put_stream(&key, body).await?;
        let Ok(size) = i64::try_from(written) else {
            self.discard_file(&key).await;
            return Err(ServiceError::Internal(format!(
                "upload of {written} bytes exceeds the recordable size"
            )));
        };
        let attachment = Attachment {
            id,
            path: key.clone(),
            name: name.to_string(),
            ext: ext.to_string(),
            size,
            upload_on: now,
            uploader: command
                .uploader
                .unwrap_or_else(|| self.default_uploader.clone()),
            puid: command.puid,
            subgroup: command.subgroup,
        };

        match self.create(&attachment).await {
            Ok(stored) => {
                info!(id = %stored.id, path = %stored.path, size, "stored upload");
                Ok(stored)
            }
            Err(e) => {
                self.discard_file(&key).await;
                Err(e)
            }
        }
    }

    async fn download(&self, id: &str) -> Result<Download, ServiceError> {
        let attachment = self.get(id).await?;
        let reader = self.store.open(&attachment.path).await.map_err(|e| match e {
            StoreError::NotFound(path) => {
                ServiceError::Internal(format!("file missing for attachment {id}: {path}"))
            }
            other => other.into(),
        })?;
        Ok(Download {
            file_name: attachment.file_name(),
            len: reader.len,
            body: reader.stream,
        })
    }

    async fn delete(&self, ids: &[String]) -> Result<(), ServiceError> {
        let removed = self.db.delete_attachments(ids).await?;
        for attachment in &removed {
            if let Err(e) = self.store.delete(&attachment.path).await {
                warn!(id = %attachment.id, "failed to remove file: {e}");
            }
        }
        info!(requested = ids.len(), removed = removed.len(), "deleted attachments");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use chrono::Timelike;
    use filedock_db::{DbError, SqliteDatabase};
    use filedock_store::{LocalStore, StoreConfig};
    use futures::StreamExt;

    use super::*;

    struct Fixture {
        _tmp: tempfile::TempDir,
        store: Arc<dyn BlobStore>,
        service: LocalService,
    }

    fn fixture() -> Fixture {
        let tmp = tempfile::tempdir().unwrap();
        let store: Arc<dyn BlobStore> = Arc::new(
            LocalStore::new(&StoreConfig {
                file_root: tmp.path().to_string_lossy().to_string(),
            })
            .unwrap(),
        );
        let db = Arc::new(SqliteDatabase::open_in_memory().unwrap());
        let service = LocalService::new(db, store.clone(), "tester");
        Fixture {
            _tmp: tmp,
            store,
            service,
        }
    }

    fn body(s: &'static str) -> ByteStream {
        futures::stream::once(async move { Ok::<_, std::io::Error>(Bytes::from(s)) }).boxed()
    }

    fn command(file_name: &str) -> UploadCommand {
        UploadCommand {
            file_name: file_name.into(),
            ..Default::default()
        }
    }

    async fn collect(mut stream: ByteStream) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(chunk) = stream.next().await {
            out.extend_from_slice(&chunk.unwrap());
        }
        out
    }

    #[tokio::test]
    async fn upload_writes_file_and_record() {
        let f = fixture();
        let before = Utc::now();
        let a = f
            .service
            .upload(
                UploadCommand {
                    file_name: "report.final.pdf".into(),
                    puid: Some("mod-a".into()),
                    subgroup: Some(2),
                    uploader: None,
                },
                body("pdf bytes"),
            )
            .await
            .unwrap();

        assert_eq!(a.name, "report.final");
        assert_eq!(a.ext, "pdf");
        assert_eq!(a.size, 9);
        assert_eq!(a.uploader, "tester");
        assert_eq!(a.puid.as_deref(), Some("mod-a"));
        assert_eq!(a.subgroup, Some(2));

        let (dir, file_name) = a.path.split_once('/').unwrap();
        assert_eq!(dir, a.upload_on.format("%Y%m").to_string());
        let (at, id, ext) = UploadPath::parse_file_name(file_name).unwrap();
        assert_eq!(id, a.id);
        assert_eq!(ext, "pdf");
        assert!(at >= before.naive_utc().with_nanosecond(0).unwrap());

        assert!(f.store.exists(&a.path).await.unwrap());
        assert_eq!(f.service.get(&a.id).await.unwrap(), a);
    }

    #[tokio::test]
    async fn upload_without_extension() {
        let f = fixture();
        let a = f.service.upload(command("Makefile"), body("all:")).await.unwrap();
        assert_eq!(a.name, "Makefile");
        assert_eq!(a.ext, "");
        assert!(a.path.ends_with(&format!("-{}", a.id)));
    }

    #[tokio::test]
    async fn upload_rejects_empty_file_name() {
        let f = fixture();
        let err = f.service.upload(command(""), body("x")).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn download_streams_bytes_with_display_name() {
        let f = fixture();
        let a = f.service.upload(command("notes.txt"), body("hello world")).await.unwrap();

        let d = f.service.download(&a.id).await.unwrap();
        assert_eq!(d.file_name, "notes.txt");
        assert_eq!(d.len, 11);
        assert_eq!(collect(d.body).await, b"hello world");
    }

    #[tokio::test]
    async fn download_unknown_id_is_not_found() {
        let f = fixture();
        let err = f.service.download("missing").await.err().unwrap();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn download_with_missing_file_is_internal() {
        let f = fixture();
        let a = f.service.upload(command("gone.txt"), body("soon gone")).await.unwrap();
        f.store.delete(&a.path).await.unwrap();

        let err = f.service.download(&a.id).await.err().unwrap();
        assert!(matches!(err, ServiceError::Internal(_)));
    }

    struct RejectingDb;

    #[async_trait]
    impl Database for RejectingDb {
        async fn insert_attachment(&self, _: &Attachment) -> Result<Attachment, DbError> {
            Err(DbError::Internal("disk full".into()))
        }
        async fn get_attachment(&self, id: &str) -> Result<Attachment, DbError> {
            Err(DbError::NotFound(id.to_string()))
        }
        async fn find_attachments(&self, page: PageRequest) -> Result<Page<Attachment>, DbError> {
            Ok(Page::new(page, 0, vec![]))
        }
        async fn find_attachments_by_module(
            &self,
            _: &str,
            _: Option<i16>,
        ) -> Result<Vec<Attachment>, DbError> {
            Ok(vec![])
        }
        async fn update_attachment(
            &self,
            id: &str,
            _: &AttachmentUpdate,
        ) -> Result<Attachment, DbError> {
            Err(DbError::NotFound(id.to_string()))
        }
        async fn delete_attachments(&self, _: &[String]) -> Result<Vec<Attachment>, DbError> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn failed_record_removes_written_file() {
        let tmp = tempfile::tempdir().unwrap();
        let store: Arc<dyn BlobStore> = Arc::new(
            LocalStore::new(&StoreConfig {
                file_root: tmp.path().to_string_lossy().to_string(),
            })
            .unwrap(),
        );
        let service = LocalService::new(Arc::new(RejectingDb), store, "tester");

        let err = service.upload(command("a.txt"), body("a")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Internal(_)));

        let month = Utc::now().format("%Y%m").to_string();
        let leftovers = std::fs::read_dir(tmp.path().join(month))
            .map(|entries| entries.count())
            .unwrap_or(0);
        assert_eq!(leftovers, 0);
    }

    /// Claims every write was larger than any record can hold.
    #[derive(Default)]
    struct OversizedStore {
        deleted: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl BlobStore for OversizedStore {
        async fn put_stream(&self, _: &str, _: ByteStream) -> Result<u64, StoreError> {
            Ok(u64::MAX)
        }
        async fn open(&self, key: &str) -> Result<filedock_store::BlobReader, StoreError> {
            Err(StoreError::NotFound(key.to_string()))
        }
        async fn delete(&self, key: &str) -> Result<(), StoreError> {
            self.deleted.lock().unwrap().push(key.to_string());
            Ok(())
        }
        async fn exists(&self, _: &str) -> Result<bool, StoreError> {
            Ok(false)
        }
    }

    #[tokio::test]
    async fn unrecordable_size_fails_and_discards_file() {
        let store = Arc::new(OversizedStore::default());
        let db = Arc::new(SqliteDatabase::open_in_memory().unwrap());
        let service = LocalService::new(db, store.clone(), "tester");

        let err = service.upload(command("huge.iso"), body("x")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Internal(_)));

        let deleted = store.deleted.lock().unwrap().clone();
        assert_eq!(deleted.len(), 1);
        assert!(deleted[0].ends_with(".iso"));
        let page = service.find(PageRequest::new(0, 10).unwrap()).await.unwrap();
        assert_eq!(page.count, 0);
    }

    #[tokio::test]
    async fn update_changes_grouping_and_keeps_file() {
        let f = fixture();
        let a = f.service.upload(command("plan.txt"), body("v1")).await.unwrap();

        let updated = f
            .service
            .update(
                &a.id,
                &AttachmentUpdate {
                    name: Some("final-plan".into()),
                    puid: Some("mod-z".into()),
                    subgroup: Some(9),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "final-plan");
        assert_eq!(updated.puid.as_deref(), Some("mod-z"));
        assert_eq!(updated.subgroup, Some(9));
        assert_eq!(updated.path, a.path);

        let d = f.service.download(&a.id).await.unwrap();
        assert_eq!(d.file_name, "final-plan.txt");
        assert_eq!(collect(d.body).await, b"v1");
    }

    #[tokio::test]
    async fn update_rejects_empty_name_and_unknown_id() {
        let f = fixture();
        let a = f.service.upload(command("a.txt"), body("a")).await.unwrap();
        let blank = AttachmentUpdate {
            name: Some(String::new()),
            ..Default::default()
        };
        assert!(matches!(
            f.service.update(&a.id, &blank).await.unwrap_err(),
            ServiceError::InvalidInput(_)
        ));
        assert!(matches!(
            f.service
                .update("missing", &AttachmentUpdate::default())
                .await
                .unwrap_err(),
            ServiceError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn delete_removes_records_and_files() {
        let f = fixture();
        let a = f.service.upload(command("a.txt"), body("a")).await.unwrap();
        let b = f.service.upload(command("b.txt"), body("b")).await.unwrap();

        f.service
            .delete(&[a.id.clone(), "unknown".to_string()])
            .await
            .unwrap();

        assert!(matches!(
            f.service.get(&a.id).await.unwrap_err(),
            ServiceError::NotFound(_)
        ));
        assert!(!f.store.exists(&a.path).await.unwrap());
        assert!(f.store.exists(&b.path).await.unwrap());
    }

    #[tokio::test]
    async fn find_pages_through_uploads() {
        let f = fixture();
        for i in 0..3 {
            f.service
                .upload(command(&format!("f{i}.txt")), body("x"))
                .await
                .unwrap();
        }
        let page = f.service.find(PageRequest::new(0, 25).unwrap()).await.unwrap();
        assert_eq!(page.count, 3);
        assert_eq!(page.page_no, 0);
        assert_eq!(page.page_size, 25);
        assert_eq!(page.rows.len(), 3);
    }
}
