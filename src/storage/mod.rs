//! Report file storage
//!
//! Uploaded report files live behind the `ReportStorage` port; archive
//! metadata is persisted separately through the repository.

pub mod local;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use uuid::Uuid;

pub use local::LocalReportStorage;

/// Key prefix of objects stored on the local filesystem
pub const LOCAL_PREFIX: &str = "local://";

/// Accepted upload content types: PDF, CSV, XLSX, XLS
pub const ALLOWED_CONTENT_TYPES: [&str; 4] = [
    "application/pdf",
    "text/csv",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "application/vnd.ms-excel",
];

pub fn is_allowed_content_type(content_type: &str) -> bool {
    ALLOWED_CONTENT_TYPES.contains(&content_type)
}

/// Content type served for a stored report, derived from its extension.
pub fn content_type_for(file_name: &str) -> &'static str {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "pdf" => "application/pdf",
        "csv" => "text/csv",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "xls" => "application/vnd.ms-excel",
        _ => "application/octet-stream",
    }
}

/// Replace everything outside `[A-Za-z0-9_.-]` with `_`.
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[derive(Debug, Clone)]
pub struct ReportUpload {
    pub tenant_id: Uuid,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
    pub uploaded_by: String,
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait ReportStorage: Send + Sync {
    /// Persist an upload and return its storage key.
    async fn store(&self, upload: &ReportUpload) -> Result<String, StorageError>;

    async fn read(&self, storage_key: &str) -> Result<Vec<u8>, StorageError>;
}
