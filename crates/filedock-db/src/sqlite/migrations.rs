use rusqlite::Connection;

use super::SqliteResultExt;
use crate::DbError;

pub(crate) fn run(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version    INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        );",
    )
    .to_db()?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |r| r.get(0),
        )
        .unwrap_or(0);

    if current_version < 1 {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS attachments (
                 id         TEXT PRIMARY KEY,
                 path       TEXT NOT NULL UNIQUE,
                 name       TEXT NOT NULL,
                 ext        TEXT NOT NULL DEFAULT '',
                 size       INTEGER NOT NULL DEFAULT 0,
                 upload_on  TEXT NOT NULL,
                 uploader   TEXT NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_attachments_upload_on ON attachments(upload_on);
             INSERT INTO schema_version (version, applied_at) VALUES (1, datetime('now'));",
        )
        .to_db()?;
    }

    if current_version < 2 {
        // v2: module grouping columns
        let has_column = |table: &str, col: &str| -> bool {
            conn.prepare(&format!("SELECT {col} FROM {table} LIMIT 0"))
                .is_ok()
        };
        if !has_column("attachments", "puid") {
            conn.execute_batch("ALTER TABLE attachments ADD COLUMN puid TEXT;")
                .to_db()?;
        }
        if !has_column("attachments", "subgroup") {
            conn.execute_batch("ALTER TABLE attachments ADD COLUMN subgroup INTEGER;")
                .to_db()?;
        }
        conn.execute_batch(
            "CREATE INDEX IF NOT EXISTS idx_attachments_module ON attachments(puid, subgroup);
             INSERT INTO schema_version (version, applied_at) VALUES (2, datetime('now'));",
        )
        .to_db()?;
    }

    Ok(())
}
