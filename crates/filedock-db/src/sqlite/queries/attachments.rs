use rusqlite::{params, Row};

use filedock_core::{Attachment, AttachmentUpdate, Page, PageRequest};

use super::super::{SqliteDatabase, SqliteResultExt};
use crate::DbError;

fn row_to_attachment(row: &Row) -> rusqlite::Result<Attachment> {
    Ok(Attachment {
        id: row.get("id")?,
        path: row.get("path")?,
        name: row.get("name")?,
        ext: row.get("ext")?,
        size: row.get("size")?,
        upload_on: row.get("upload_on")?,
        uploader: row.get("uploader")?,
        puid: row.get("puid")?,
        subgroup: row.get("subgroup")?,
    })
}

fn not_found(id: &str) -> impl FnOnce(rusqlite::Error) -> DbError + '_ {
    move |e| match e {
        rusqlite::Error::QueryReturnedNoRows => DbError::NotFound(format!("attachment {id}")),
        other => DbError::Internal(other.to_string()),
    }
}

impl SqliteDatabase {
    pub fn insert_attachment_sync(&self, a: &Attachment) -> Result<Attachment, DbError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO attachments
                     (id, path, name, ext, size, upload_on, uploader, puid, subgroup)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    a.id,
                    a.path,
                    a.name,
                    a.ext,
                    a.size,
                    a.upload_on,
                    a.uploader,
                    a.puid,
                    a.subgroup
                ],
            )
            .to_db()?;
            conn.query_row(
                "SELECT * FROM attachments WHERE id = ?1",
                params![a.id],
                row_to_attachment,
            )
            .map_err(not_found(&a.id))
        })
    }

    pub fn get_attachment_sync(&self, id: &str) -> Result<Attachment, DbError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT * FROM attachments WHERE id = ?1",
                params![id],
                row_to_attachment,
            )
            .map_err(not_found(id))
        })
    }

    pub fn find_attachments_sync(&self, page: PageRequest) -> Result<Page<Attachment>, DbError> {
        self.with_conn(|conn| {
            let count: i64 = conn
                .query_row("SELECT count(*) FROM attachments", [], |r| r.get(0))
                .to_db()?;
            let offset = i64::try_from(page.offset()).unwrap_or(i64::MAX);
            let mut stmt = conn
                .prepare(
                    "SELECT * FROM attachments
                     ORDER BY upload_on DESC, id ASC
                     LIMIT ?1 OFFSET ?2",
                )
                .to_db()?;
            let rows = stmt
                .query_map(params![page.page_size, offset], row_to_attachment)
                .to_db()?
                .collect::<Result<Vec<_>, _>>()
                .to_db()?;
            Ok(Page::new(page, count.max(0) as u64, rows))
        })
    }

    pub fn find_attachments_by_module_sync(
        &self,
        puid: &str,
        subgroup: Option<i16>,
    ) -> Result<Vec<Attachment>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT * FROM attachments
                     WHERE puid = ?1 AND (?2 IS NULL OR subgroup = ?2)
                     ORDER BY upload_on DESC, id ASC",
                )
                .to_db()?;
            let rows = stmt
                .query_map(params![puid, subgroup], row_to_attachment)
                .to_db()?
                .collect::<Result<Vec<_>, _>>()
                .to_db()?;
            Ok(rows)
        })
    }

    pub fn update_attachment_sync(
        &self,
        id: &str,
        update: &AttachmentUpdate,
    ) -> Result<Attachment, DbError> {
        self.with_conn(|conn| {
            let changed = conn
                .execute(
                    "UPDATE attachments
                     SET name = COALESCE(?2, name),
                         puid = COALESCE(?3, puid),
                         subgroup = COALESCE(?4, subgroup)
                     WHERE id = ?1",
                    params![id, update.name, update.puid, update.subgroup],
                )
                .to_db()?;
            if changed == 0 {
                return Err(DbError::NotFound(format!("attachment {id}")));
            }
            conn.query_row(
                "SELECT * FROM attachments WHERE id = ?1",
                params![id],
                row_to_attachment,
            )
            .map_err(not_found(id))
        })
    }

    pub fn delete_attachments_sync(&self, ids: &[String]) -> Result<Vec<Attachment>, DbError> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction().to_db()?;
            let mut removed = Vec::with_capacity(ids.len());
            for id in ids {
                match tx.query_row(
                    "SELECT * FROM attachments WHERE id = ?1",
                    params![id],
                    row_to_attachment,
                ) {
                    Ok(attachment) => {
                        tx.execute("DELETE FROM attachments WHERE id = ?1", params![id])
                            .to_db()?;
                        removed.push(attachment);
                    }
                    Err(rusqlite::Error::QueryReturnedNoRows) => {}
                    Err(e) => return Err(DbError::Internal(e.to_string())),
                }
            }
            tx.commit().to_db()?;
            Ok(removed)
        })
    }
}
