use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::CoreError;

/// Metadata for one stored file.
///
/// `path` is relative to the configured file root; the bytes live at
/// `{file_root}/{path}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: String,
    pub path: String,
    /// File name without extension.
    pub name: String,
    /// Extension without the dot, possibly empty.
    pub ext: String,
    pub size: i64,
    pub upload_on: DateTime<Utc>,
    pub uploader: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub puid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subgroup: Option<i16>,
}

impl Attachment {
    /// Display file name: `name.ext`, or just `name` when there is no extension.
    pub fn file_name(&self) -> String {
        if self.ext.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.name, self.ext)
        }
    }
}

/// What a client supplies alongside the uploaded bytes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadCommand {
    /// Original file name as sent by the client, extension included.
    pub file_name: String,
    pub puid: Option<String>,
    pub subgroup: Option<i16>,
    /// Falls back to the server's configured uploader when `None`.
    pub uploader: Option<String>,
}

/// Metadata changes for an existing attachment. `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AttachmentUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub puid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subgroup: Option<i16>,
}

impl AttachmentUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.puid.is_none() && self.subgroup.is_none()
    }

    /// Reject changes no stored record may carry.
    pub fn validate(&self) -> Result<(), CoreError> {
        match &self.name {
            Some(name) if name.is_empty() => {
                Err(CoreError::InvalidInput("name must not be empty".into()))
            }
            _ => Ok(()),
        }
    }
}

/// Split an original file name at its last dot into `(name, ext)`.
///
/// `report.final.pdf` gives `("report.final", "pdf")`; a name without a dot
/// has an empty extension.
pub fn split_file_name(file_name: &str) -> (&str, &str) {
    match file_name.rfind('.') {
        Some(idx) => (&file_name[..idx], &file_name[idx + 1..]),
        None => (file_name, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Attachment {
        Attachment {
            id: "a1".into(),
            path: "202401/20240115T103000-a1.txt".into(),
            name: "notes".into(),
            ext: "txt".into(),
            size: 12,
            upload_on: Utc::now(),
            uploader: "tester".into(),
            puid: None,
            subgroup: None,
        }
    }

    #[test]
    fn file_name_joins_name_and_ext() {
        assert_eq!(sample().file_name(), "notes.txt");
        let bare = Attachment {
            ext: String::new(),
            ..sample()
        };
        assert_eq!(bare.file_name(), "notes");
    }

    #[test]
    fn split_file_name_uses_last_dot() {
        assert_eq!(split_file_name("report.final.pdf"), ("report.final", "pdf"));
        assert_eq!(split_file_name("README"), ("README", ""));
        assert_eq!(split_file_name(".bashrc"), ("", "bashrc"));
        assert_eq!(split_file_name("trailing."), ("trailing", ""));
    }

    #[test]
    fn update_reads_partial_json() {
        let update: AttachmentUpdate = serde_json::from_str(r#"{"puid":"mod-b"}"#).unwrap();
        assert_eq!(update.puid.as_deref(), Some("mod-b"));
        assert!(update.name.is_none());
        assert!(!update.is_empty());
        assert!(AttachmentUpdate::default().is_empty());
        assert!(serde_json::from_str::<AttachmentUpdate>(r#"{"size":1}"#).is_err());
    }

    #[test]
    fn update_rejects_empty_name() {
        let update = AttachmentUpdate {
            name: Some(String::new()),
            ..Default::default()
        };
        assert!(update.validate().is_err());
        assert!(AttachmentUpdate::default().validate().is_ok());
    }

    #[test]
    fn serializes_camel_case_and_skips_empty_grouping() {
        let v = serde_json::to_value(sample()).unwrap();
        assert!(v["uploadOn"].is_string());
        assert!(v.get("upload_on").is_none());
        assert!(v.get("puid").is_none());
        assert!(v.get("subgroup").is_none());

        let grouped = Attachment {
            puid: Some("mod-a".into()),
            subgroup: Some(3),
            ..sample()
        };
        let v = serde_json::to_value(grouped).unwrap();
        assert_eq!(v["puid"], "mod-a");
        assert_eq!(v["subgroup"], 3);
    }
}
