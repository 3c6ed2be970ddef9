use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;

use crate::{BlobReader, BlobStore, ByteStream, StoreConfig, StoreError};

pub struct LocalStore {
    base_dir: PathBuf,
}

impl LocalStore {
    pub fn new(config: &StoreConfig) -> Result<Self, StoreError> {
        let base_dir = PathBuf::from(&config.file_root);
        std::fs::create_dir_all(&base_dir).map_err(|source| StoreError::Io {
            key: base_dir.display().to_string(),
            source,
        })?;
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Map a key onto the filesystem, refusing anything that could escape the root.
    fn resolve(&self, key: &str) -> Result<PathBuf, StoreError> {
        let rel = Path::new(key);
        let plain = rel
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if key.is_empty() || !plain {
            return Err(StoreError::Internal(format!("invalid key: {key}")));
        }
        Ok(self.base_dir.join(rel))
    }
}

fn io_err(key: &str) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        key: key.to_string(),
        source,
    }
}

#[async_trait]
impl BlobStore for LocalStore {
    async fn put_stream(&self, key: &str, mut stream: ByteStream) -> Result<u64, StoreError> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err(key))?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(io_err(key))?;

        let mut written = 0u64;
        let result: Result<(), std::io::Error> = async {
            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                file.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }
            file.flush().await?;
            file.sync_all().await
        }
        .await;

        if let Err(source) = result {
            drop(file);
            if let Err(e) = tokio::fs::remove_file(&path).await {
                tracing::warn!(key, "failed to remove partial file: {e}");
            }
            return Err(StoreError::Io {
                key: key.to_string(),
                source,
            });
        }
        Ok(written)
    }

    async fn open(&self, key: &str) -> Result<BlobReader, StoreError> {
        let path = self.resolve(key)?;
        let file = match tokio::fs::File::open(&path).await {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(key.to_string()))
            }
            Err(e) => return Err(io_err(key)(e)),
        };
        let len = file.metadata().await.map_err(io_err(key))?.len();
        Ok(BlobReader {
            len,
            stream: ReaderStream::new(file).boxed(),
        })
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let path = self.resolve(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_err(key)(e)),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let path = self.resolve(key)?;
        tokio::fs::try_exists(&path).await.map_err(io_err(key))
    }
}
