//! Storage naming for uploaded files.
//!
//! Every upload lands at `{YYYYMM}/{YYYYMMddTHHmmss}-{id}.{ext}` under the file
//! root: one directory per month, one file per upload, addressable by the id
//! embedded in its name.

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::CoreError;

const DIR_FORMAT: &str = "%Y%m";
const STAMP_FORMAT: &str = "%Y%m%dT%H%M%S";
const STAMP_LEN: usize = 15;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPath {
    /// Monthly bucket, e.g. `202401`.
    pub dir: String,
    /// `{stamp}-{id}.{ext}`, or `{stamp}-{id}` when `ext` is empty.
    pub file_name: String,
}

impl UploadPath {
    pub fn new(now: DateTime<Utc>, id: &str, ext: &str) -> Self {
        let dir = now.format(DIR_FORMAT).to_string();
        let stamp = now.format(STAMP_FORMAT);
        let file_name = if ext.is_empty() {
            format!("{stamp}-{id}")
        } else {
            format!("{stamp}-{id}.{ext}")
        };
        Self { dir, file_name }
    }

    /// Path relative to the file root, always `/`-separated.
    pub fn relative(&self) -> String {
        format!("{}/{}", self.dir, self.file_name)
    }

    /// Recover `(timestamp, id, ext)` from a stored file name.
    pub fn parse_file_name(file_name: &str) -> Result<(NaiveDateTime, String, String), CoreError> {
        let invalid = || CoreError::InvalidInput(format!("not an upload file name: {file_name}"));

        let stamp = file_name.get(..STAMP_LEN).ok_or_else(invalid)?;
        let rest = file_name
            .get(STAMP_LEN..)
            .and_then(|r| r.strip_prefix('-'))
            .ok_or_else(invalid)?;
        let at = NaiveDateTime::parse_from_str(stamp, STAMP_FORMAT).map_err(|_| invalid())?;

        // ids never contain a dot, so the first dot starts the extension
        let (id, ext) = rest.split_once('.').unwrap_or((rest, ""));
        if id.is_empty() {
            return Err(invalid());
        }
        Ok((at, id.to_string(), ext.to_string()))
    }
}
