use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{application::error::ApplicationError, domain::models::metadata::FileRecord};

/// Result of an info lookup that may discover the record already expired.
#[derive(Debug, Clone)]
pub enum ViewOutcome {
    Viewed(FileRecord),
    /// The record was past `expires_at` and has been removed.
    Expired(FileRecord),
}

/// File metadata table. Every method is atomic with respect to the others,
/// so a record is never read or counted after its removal has begun.
#[async_trait]
pub trait FileRepository: Send + Sync {
    /// Inserts unless the code is already live. Returns `false` on collision.
    async fn insert_if_absent(&self, record: FileRecord) -> Result<bool, ApplicationError>;
    async fn get(&self, code: &str) -> Result<FileRecord, ApplicationError>;
    async fn contains(&self, code: &str) -> Result<bool, ApplicationError>;
    async fn record_view(&self, code: &str, now: DateTime<Utc>) -> Result<ViewOutcome, ApplicationError>;
    async fn record_download(&self, code: &str) -> Result<FileRecord, ApplicationError>;
    async fn remove(&self, code: &str) -> Result<FileRecord, ApplicationError>;
    /// Removes the record only if `owner` uploaded it.
    async fn remove_owned(&self, code: &str, owner: &str) -> Result<FileRecord, ApplicationError>;
    /// Removes and returns every record with `now >= expires_at`.
    async fn take_expired(&self, now: DateTime<Utc>) -> Result<Vec<FileRecord>, ApplicationError>;
    async fn list(&self) -> Result<Vec<FileRecord>, ApplicationError>;
    async fn list_by_owner(&self, owner: &str) -> Result<Vec<FileRecord>, ApplicationError>;
    async fn count(&self) -> Result<usize, ApplicationError>;
    /// Writes the whole table to the backing document.
    async fn persist(&self) -> Result<(), ApplicationError>;
}
