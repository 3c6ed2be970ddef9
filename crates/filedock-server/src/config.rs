use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use clap::Parser;
use filedock_db::DbConfig;
use filedock_store::StoreConfig;

#[derive(Debug, Clone, Parser)]
#[command(name = "filedock-server", about = "Attachment upload and download server")]
pub struct ServerConfig {
    /// Address to bind
    #[arg(long, env = "FILEDOCK_BIND", default_value = "0.0.0.0")]
    pub bind: IpAddr,

    /// Port to listen on
    #[arg(long, env = "FILEDOCK_PORT", default_value = "3720")]
    pub port: u16,

    /// Root directory for stored files. Defaults to `{data_dir}/files`.
    #[arg(long, env = "FILEDOCK_FILE_ROOT")]
    pub file_root: Option<PathBuf>,

    /// SQLite metadata database. Defaults to `{data_dir}/filedock.db`.
    #[arg(long, env = "FILEDOCK_DB_PATH")]
    pub db_path: Option<PathBuf>,

    /// Uploader recorded on new attachments
    #[arg(long, env = "FILEDOCK_UPLOADER", default_value = "filedock")]
    pub uploader: String,

    /// Largest accepted multipart request body, in bytes
    #[arg(long, env = "FILEDOCK_MAX_UPLOAD_BYTES", default_value = "67108864")]
    pub max_upload_bytes: usize,
}

impl ServerConfig {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }

    pub fn file_root(&self) -> PathBuf {
        self.file_root
            .clone()
            .unwrap_or_else(|| filedock_db::data_dir().join("files"))
    }

    pub fn db_config(&self) -> DbConfig {
        DbConfig {
            sqlite_path: self
                .db_path
                .as_ref()
                .map(|p| p.to_string_lossy().to_string()),
        }
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            file_root: self.file_root().to_string_lossy().to_string(),
        }
    }
}
