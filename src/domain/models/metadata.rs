use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::file::StorageLocator;

pub const MB: u64 = 1024 * 1024;
pub const GB: u64 = 1024 * MB;

/// Retention window for an upload of `size` bytes. Bigger files live shorter.
pub fn expiry_window(size: u64) -> Duration {
    if size < 100 * MB {
        Duration::hours(30)
    } else if size < GB {
        Duration::hours(24)
    } else if size < 5 * GB {
        Duration::hours(12)
    } else {
        Duration::hours(1)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub code: String,
    pub original_name: String,
    pub size: u64,
    pub mime_type: String,
    pub storage_locator: StorageLocator,
    pub uploaded_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub uploaded_by: Option<String>,
    #[serde(default)]
    pub view_count: u64,
    #[serde(default)]
    pub download_count: u64,
}

impl FileRecord {
    pub fn new(
        code: String,
        original_name: String,
        size: u64,
        mime_type: String,
        storage_locator: StorageLocator,
        uploaded_by: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            code,
            original_name,
            size,
            mime_type,
            storage_locator,
            uploaded_at: now,
            expires_at: now + expiry_window(size),
            uploaded_by,
            view_count: 0,
            download_count: 0,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_owned_by(&self, username: &str) -> bool {
        self.uploaded_by.as_deref() == Some(username)
    }
}
