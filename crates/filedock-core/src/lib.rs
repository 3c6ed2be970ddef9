pub mod attachment;
pub mod error;
pub mod page;
pub mod upload_path;

pub use attachment::{split_file_name, Attachment, AttachmentUpdate, UploadCommand};
pub use error::CoreError;
pub use page::{Page, PageRequest};
pub use upload_path::UploadPath;
