use async_trait::async_trait;

use crate::{
    application::error::ApplicationError,
    domain::models::file::{FileData, StorageLocator},
};

/// External object storage. Timeouts and retries are the provider's concern.
#[async_trait]
pub trait StorageService: Send + Sync {
    async fn upload(&self, file_data: FileData) -> Result<StorageLocator, ApplicationError>;
    async fn download(&self, locator: &StorageLocator) -> Result<Vec<u8>, ApplicationError>;
    async fn delete(&self, locator: &StorageLocator) -> Result<(), ApplicationError>;
    /// Aggregate bytes currently stored.
    async fn usage(&self) -> Result<u64, ApplicationError>;
}
