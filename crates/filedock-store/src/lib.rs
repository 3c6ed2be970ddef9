mod local;

pub use local::LocalStore;

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};

/// A boxed stream of body chunks, as produced by a multipart field or a file reader.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("io error on {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("store error: {0}")]
    Internal(String),
}

/// An opened object ready to be streamed out.
pub struct BlobReader {
    /// Exact byte length at open time.
    pub len: u64,
    pub stream: ByteStream,
}

/// A store for file bodies keyed by `/`-separated relative paths.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Create a new object from `stream`, failing if the key already exists.
    /// Returns the number of bytes written. Nothing is left behind on failure.
    async fn put_stream(&self, key: &str, stream: ByteStream) -> Result<u64, StoreError>;

    /// Create a new object from an in-memory buffer.
    async fn put(&self, key: &str, data: Bytes) -> Result<u64, StoreError> {
        let stream = futures::stream::once(async move { Ok::<_, std::io::Error>(data) });
        self.put_stream(key, stream.boxed()).await
    }

    /// Open an object for streaming. Returns `StoreError::NotFound` if absent.
    async fn open(&self, key: &str) -> Result<BlobReader, StoreError>;

    /// Read a whole object into memory.
    async fn get(&self, key: &str) -> Result<Bytes, StoreError> {
        let mut reader = self.open(key).await?;
        let mut buf = Vec::with_capacity(reader.len as usize);
        while let Some(chunk) = reader.stream.next().await {
            let chunk = chunk.map_err(|source| StoreError::Io {
                key: key.to_string(),
                source,
            })?;
            buf.extend_from_slice(&chunk);
        }
        Ok(Bytes::from(buf))
    }

    /// Delete an object. No-op if absent.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Check if an object exists.
    async fn exists(&self, key: &str) -> Result<bool, StoreError>;
}

/// Configuration for the blob store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Root directory every key resolves under.
    pub file_root: String,
}

pub fn create_store(config: &StoreConfig) -> Result<Arc<dyn BlobStore>, StoreError> {
    Ok(Arc::new(LocalStore::new(config)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_store_makes_root_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("files");
        let config = StoreConfig {
            file_root: root.to_string_lossy().to_string(),
        };
        let store = create_store(&config).unwrap();
        assert!(root.is_dir());
        assert!(!store.exists("202401/x.txt").await.unwrap());
    }
}
