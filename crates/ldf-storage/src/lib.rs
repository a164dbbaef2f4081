//! Storage backends for distribution artifacts and branding assets.
//!
//! [`StorageBackend`] is the single capability set both implementations
//! (`LocalFsBackend`, `S3Backend`) satisfy; callers never branch on which
//! one they have. Keys use forward slashes and follow two fixed layouts:
//! `distribution/{owner_id}/{distribution_id}/{relative_path}` for build
//! artifacts, `system/{asset}.{ext}` for branding. Listing never returns
//! directory placeholder entries.
//!
//! # Example
//!
//! ```no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use ldf_storage::{LocalFsBackend, StorageBackend};
//!
//! let storage = LocalFsBackend::new("/var/lib/ldf/storage");
//! storage.upload_bytes("distribution/owner/dist/kernel.tar.xz", b"...".to_vec(), "application/x-xz").await?;
//! assert!(storage.exists("distribution/owner/dist/kernel.tar.xz").await?);
//! # Ok(())
//! # }
//! ```

mod error;
mod local;
mod s3;

pub use error::{StorageError, StorageResult};
pub use local::LocalFsBackend;
pub use s3::{S3Backend, S3Config};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures_util::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};

/// A chunked byte source for [`StorageBackend::upload`], the same shape
/// `reqwest::Response::bytes_stream` produces, so download and upload
/// compose without an intermediate buffer.
pub type UploadStream = BoxStream<'static, StorageResult<Bytes>>;

/// Wraps a single in-memory buffer as an [`UploadStream`] of one chunk, for
/// callers (branding uploads, tests) that already hold the whole object.
pub fn upload_stream_from_bytes(data: impl Into<Bytes>) -> UploadStream {
    stream::once(async { Ok(data.into()) }).boxed()
}

/// Which concrete backend a [`StorageBackend`] trait object is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageType {
    Local,
    S3,
}

impl std::fmt::Display for StorageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageType::Local => write!(f, "local"),
            StorageType::S3 => write!(f, "s3"),
        }
    }
}

/// Metadata returned by [`StorageBackend::get_info`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectInfo {
    pub key: String,
    pub size: u64,
    pub content_type: String,
    pub etag: Option<String>,
    pub last_modified: DateTime<Utc>,
}

/// Unified interface over local filesystem and S3-compatible object storage.
///
/// Every method returns a categorized [`StorageError`] — callers only retry
/// on `StorageError::Transient`.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Writes `size` bytes read from `stream` to `key`, without buffering
    /// the whole object in memory first. `size` must equal the total bytes
    /// `stream` yields; implementations may use it up front (S3's
    /// `Content-Length`) rather than discovering it by draining the stream.
    async fn upload(&self, key: &str, stream: UploadStream, size: u64, content_type: &str) -> StorageResult<()>;
    async fn download(&self, key: &str) -> StorageResult<Vec<u8>>;
    async fn exists(&self, key: &str) -> StorageResult<bool>;
    async fn get_info(&self, key: &str) -> StorageResult<ObjectInfo>;
    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>>;
    async fn delete(&self, key: &str) -> StorageResult<()>;
    async fn get_presigned_url(&self, key: &str, ttl_secs: u64) -> StorageResult<String>;
    fn get_web_url(&self, key: &str) -> Option<String>;
    async fn ping(&self) -> StorageResult<()>;
    fn storage_type(&self) -> StorageType;
    fn location(&self) -> String;

    /// Convenience wrapper over [`upload`](Self::upload) for callers that
    /// already hold the whole object in memory (branding assets, tests).
    async fn upload_bytes(&self, key: &str, data: Vec<u8>, content_type: &str) -> StorageResult<()> {
        let size = data.len() as u64;
        self.upload(key, upload_stream_from_bytes(data), size, content_type).await
    }

    /// Copy within the same backend; the default reads then writes.
    async fn copy(&self, from: &str, to: &str) -> StorageResult<()> {
        let data = self.download(from).await?;
        let info = self.get_info(from).await?;
        let size = data.len() as u64;
        self.upload(to, upload_stream_from_bytes(data), size, &info.content_type).await
    }

    /// Move within the same backend; the default copies then deletes.
    async fn mv(&self, from: &str, to: &str) -> StorageResult<()> {
        self.copy(from, to).await?;
        self.delete(from).await
    }
}

/// Builds the artifact key `distribution/{owner_id}/{distribution_id}/{relative_path}`.
pub fn distribution_key(owner_id: &str, distribution_id: &str, relative_path: &str) -> String {
    format!(
        "distribution/{owner_id}/{distribution_id}/{}",
        relative_path.trim_start_matches('/')
    )
}

/// Builds the branding key `system/{asset}.{ext}`.
pub fn system_key(asset: &str, ext: &str) -> String {
    format!("system/{asset}.{ext}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distribution_key_layout() {
        assert_eq!(
            distribution_key("owner-1", "dist-1", "kernel.tar.xz"),
            "distribution/owner-1/dist-1/kernel.tar.xz"
        );
    }

    #[test]
    fn system_key_layout() {
        assert_eq!(system_key("logo", "png"), "system/logo.png");
    }

    #[tokio::test]
    async fn local_and_s3_are_interchangeable_behind_the_trait() {
        let dir = tempfile::tempdir().unwrap();
        let backends: Vec<Box<dyn StorageBackend>> = vec![Box::new(LocalFsBackend::new(dir.path()))];
        for backend in backends {
            backend.upload_bytes("k", b"data".to_vec(), "text/plain").await.unwrap();
            assert!(backend.exists("k").await.unwrap());
            assert_eq!(backend.download("k").await.unwrap(), b"data");
        }
    }
}
