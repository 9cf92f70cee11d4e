//! Local filesystem report storage
//!
//! Keys look like `local://{tenant}/{unix_millis}-{file}` and resolve to
//! paths under the configured base directory.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;

use super::{sanitize_file_name, sha256_hex, ReportStorage, ReportUpload, StorageError, LOCAL_PREFIX};

#[derive(Debug, Clone)]
pub struct LocalReportStorage {
    base_dir: PathBuf,
}

impl LocalReportStorage {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Map a key to a path inside the base directory. Absolute paths and
    /// `..` segments are rejected.
    pub fn resolve(&self, storage_key: &str) -> Result<PathBuf, StorageError> {
        let relative = storage_key
            .strip_prefix(LOCAL_PREFIX)
            .ok_or_else(|| StorageError::InvalidKey(storage_key.to_string()))?;

        let relative = Path::new(relative);
        let escapes = relative
            .components()
            .any(|component| !matches!(component, Component::Normal(_) | Component::CurDir));
        if escapes || relative.as_os_str().is_empty() {
            return Err(StorageError::InvalidKey(storage_key.to_string()));
        }

        Ok(self.base_dir.join(relative))
    }
}

#[async_trait]
impl ReportStorage for LocalReportStorage {
    async fn store(&self, upload: &ReportUpload) -> Result<String, StorageError> {
        let key = format!(
            "{}{}/{}-{}",
            LOCAL_PREFIX,
            upload.tenant_id,
            Utc::now().timestamp_millis(),
            sanitize_file_name(&upload.file_name)
        );
        let destination = self.resolve(&key)?;

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&destination, &upload.bytes).await?;

        tracing::info!(
            storage_key = %key,
            tenant_id = %upload.tenant_id,
            uploaded_by = %upload.uploaded_by,
            content_type = %upload.content_type,
            bytes = upload.bytes.len(),
            sha256 = %sha256_hex(&upload.bytes),
            "Report stored"
        );

        Ok(key)
    }

    async fn read(&self, storage_key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(storage_key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(storage_key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn upload(name: &str) -> ReportUpload {
        ReportUpload {
            tenant_id: Uuid::new_v4(),
            file_name: name.to_string(),
            content_type: "text/csv".to_string(),
            bytes: b"period,revenue\n2025-01,100\n".to_vec(),
            uploaded_by: "user-1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_store_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalReportStorage::new(dir.path());
        let upload = upload("q1 report.csv");

        let key = storage.store(&upload).await.unwrap();
        assert!(key.starts_with(&format!("local://{}/", upload.tenant_id)));
        assert!(key.ends_with("-q1_report.csv"));

        let bytes = storage.read(&key).await.unwrap();
        assert_eq!(bytes, upload.bytes);
    }

    #[tokio::test]
    async fn test_missing_object() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalReportStorage::new(dir.path());

        let err = storage.read("local://tenant/nothing.csv").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[test]
    fn test_resolve_rejects_escaping_keys() {
        let storage = LocalReportStorage::new("/srv/uploads");

        assert!(storage.resolve("local://../secret").is_err());
        assert!(storage.resolve("local://tenant/../../secret").is_err());
        assert!(storage.resolve("local:///etc/passwd").is_err());
        assert!(storage.resolve("s3://bucket/key").is_err());
        assert_eq!(
            storage.resolve("local://tenant/1-a.csv").unwrap(),
            PathBuf::from("/srv/uploads/tenant/1-a.csv")
        );
    }
}
