use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::models::metadata::FileRecord;

#[derive(Debug, Serialize)]
pub struct UploadFileResponse {
    pub code: String,
    #[serde(rename = "originalName")]
    pub original_name: String,
    pub size: u64,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    #[serde(rename = "uploadedAt")]
    pub uploaded_at: DateTime<Utc>,
    #[serde(rename = "expiresAt")]
    pub expires_at: DateTime<Utc>,
    #[serde(rename = "shareLink")]
    pub share_link: String,
}

impl UploadFileResponse {
    pub fn new(record: FileRecord, share_link: String) -> Self {
        Self {
            code: record.code,
            original_name: record.original_name,
            size: record.size,
            mime_type: record.mime_type,
            uploaded_at: record.uploaded_at,
            expires_at: record.expires_at,
            share_link,
        }
    }
}

/// Public view of a record. Never exposes the storage locator.
#[derive(Debug, Serialize)]
pub struct FileInfoResponse {
    pub code: String,
    #[serde(rename = "originalName")]
    pub original_name: String,
    pub size: u64,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    #[serde(rename = "uploadedAt")]
    pub uploaded_at: DateTime<Utc>,
    #[serde(rename = "expiresAt")]
    pub expires_at: DateTime<Utc>,
    #[serde(rename = "viewCount")]
    pub view_count: u64,
    #[serde(rename = "downloadCount")]
    pub download_count: u64,
}

impl From<FileRecord> for FileInfoResponse {
    fn from(record: FileRecord) -> Self {
        Self {
            code: record.code,
            original_name: record.original_name,
            size: record.size,
            mime_type: record.mime_type,
            uploaded_at: record.uploaded_at,
            expires_at: record.expires_at,
            view_count: record.view_count,
            download_count: record.download_count,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FileSummaryResponse {
    #[serde(flatten)]
    pub info: FileInfoResponse,
    #[serde(rename = "uploadedBy")]
    pub uploaded_by: Option<String>,
}

impl From<FileRecord> for FileSummaryResponse {
    fn from(record: FileRecord) -> Self {
        let uploaded_by = record.uploaded_by.clone();
        Self {
            info: FileInfoResponse::from(record),
            uploaded_by,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FileListResponse {
    pub count: usize,
    pub files: Vec<FileSummaryResponse>,
}

impl From<Vec<FileRecord>> for FileListResponse {
    fn from(records: Vec<FileRecord>) -> Self {
        Self {
            count: records.len(),
            files: records.into_iter().map(FileSummaryResponse::from).collect(),
        }
    }
}
