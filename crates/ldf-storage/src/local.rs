//! Local-filesystem storage backend, the direct descendant of `FileStorage`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;

use crate::{ObjectInfo, StorageBackend, StorageType, UploadStream};
use crate::error::{StorageError, StorageResult};

#[derive(Debug, Clone)]
pub struct LocalFsBackend {
    base_path: PathBuf,
}

impl LocalFsBackend {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn full_path(&self, key: &str) -> PathBuf {
        self.base_path.join(key)
    }

    fn io_err(key: &str, err: std::io::Error) -> StorageError {
        if err.kind() == std::io::ErrorKind::NotFound {
            StorageError::NotFound(key.to_string())
        } else {
            StorageError::Transient(format!("{key}: {err}"))
        }
    }
}

fn collect_files(dir: &Path, base: &Path, results: &mut Vec<String>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_files(&path, base, results)?;
        } else if let Ok(relative) = path.strip_prefix(base) {
            if let Some(s) = relative.to_str() {
                results.push(s.replace('\\', "/"));
            }
        }
    }
    Ok(())
}

#[async_trait]
impl StorageBackend for LocalFsBackend {
    async fn upload(&self, key: &str, mut stream: UploadStream, _size: u64, _content_type: &str) -> StorageResult<()> {
        let full_path = self.full_path(key);
        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Self::io_err(key, e))?;
        }

        let tmp_path = full_path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp_path)
            .await
            .map_err(|e| Self::io_err(key, e))?;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await.map_err(|e| Self::io_err(key, e))?;
        }
        file.flush().await.map_err(|e| Self::io_err(key, e))?;
        drop(file);

        tokio::fs::rename(&tmp_path, &full_path)
            .await
            .map_err(|e| Self::io_err(key, e))?;
        Ok(())
    }

    async fn download(&self, key: &str) -> StorageResult<Vec<u8>> {
        tokio::fs::read(self.full_path(key))
            .await
            .map_err(|e| Self::io_err(key, e))
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(tokio::fs::try_exists(self.full_path(key))
            .await
            .map_err(|e| Self::io_err(key, e))?)
    }

    async fn get_info(&self, key: &str) -> StorageResult<ObjectInfo> {
        let metadata = tokio::fs::metadata(self.full_path(key))
            .await
            .map_err(|e| Self::io_err(key, e))?;
        let last_modified: DateTime<Utc> = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        Ok(ObjectInfo {
            key: key.to_string(),
            size: metadata.len(),
            content_type: mime_guess_from_key(key),
            etag: None,
            last_modified,
        })
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let base = self.full_path(prefix);
        if !base.exists() {
            return Ok(Vec::new());
        }
        let mut results = Vec::new();
        collect_files(&base, &self.base_path, &mut results)
            .map_err(|e| StorageError::Transient(format!("{prefix}: {e}")))?;
        results.sort();
        Ok(results)
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let full_path = self.full_path(key);
        match tokio::fs::remove_file(&full_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::io_err(key, e)),
        }
    }

    async fn get_presigned_url(&self, key: &str, _ttl_secs: u64) -> StorageResult<String> {
        Ok(format!("file://{}", self.full_path(key).display()))
    }

    fn get_web_url(&self, key: &str) -> Option<String> {
        Some(format!("file://{}", self.full_path(key).display()))
    }

    async fn ping(&self) -> StorageResult<()> {
        tokio::fs::create_dir_all(&self.base_path)
            .await
            .map_err(|e| StorageError::Permanent(format!("base directory unwritable: {e}")))
    }

    fn storage_type(&self) -> StorageType {
        StorageType::Local
    }

    fn location(&self) -> String {
        self.base_path.display().to_string()
    }
}

fn mime_guess_from_key(key: &str) -> String {
    match key.rsplit('.').next() {
        Some("tar") => "application/x-tar",
        Some("gz") | Some("tgz") => "application/gzip",
        Some("xz") => "application/x-xz",
        Some("zip") => "application/zip",
        Some("png") => "image/png",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_read_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalFsBackend::new(dir.path());
        storage
            .upload_bytes("distribution/a/b/file.tar.gz", b"hello".to_vec(), "application/gzip")
            .await
            .unwrap();
        let data = storage.download("distribution/a/b/file.tar.gz").await.unwrap();
        assert_eq!(data, b"hello");
    }

    #[tokio::test]
    async fn missing_key_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalFsBackend::new(dir.path());
        let err = storage.download("nope").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn list_excludes_directory_placeholders() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalFsBackend::new(dir.path());
        storage.upload_bytes("distribution/a/one.txt", b"1".to_vec(), "text/plain").await.unwrap();
        storage.upload_bytes("distribution/a/sub/two.txt", b"2".to_vec(), "text/plain").await.unwrap();

        let listed = storage.list("distribution/a").await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|p| !p.ends_with('/')));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalFsBackend::new(dir.path());
        storage.delete("never-existed").await.unwrap();
    }

    #[tokio::test]
    async fn exists_reflects_writes() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalFsBackend::new(dir.path());
        assert!(!storage.exists("k").await.unwrap());
        storage.upload_bytes("k", b"x".to_vec(), "text/plain").await.unwrap();
        assert!(storage.exists("k").await.unwrap());
    }
}
