mod cloudinary_storage;
mod error;
mod local_storage;

use std::sync::Arc;

use cloudinary_storage::CloudinaryStorageService;
use error::StorageError;
use local_storage::LocalStorageService;

use crate::{
    application::services::{document_store::DocumentStore, storage_service::StorageService},
    domain::config::{
        local::{Provider, ServerConfig},
        secrets::Secrets,
    },
};

/// One provider instance backs both object storage and the JSON documents.
pub async fn create_storage_backend(
    config: &ServerConfig,
    secrets: &Secrets,
) -> Result<(Arc<dyn StorageService>, Arc<dyn DocumentStore>), StorageError> {
    match config.provider {
        Provider::Cloudinary => {
            let cloudinary = secrets.cloudinary.as_ref().ok_or_else(|| {
                StorageError::InvalidCredentials("Cloudinary secrets not found".to_string())
            })?;

            let service = Arc::new(CloudinaryStorageService::new(cloudinary.clone()));
            let storage: Arc<dyn StorageService> = service.clone();
            let documents: Arc<dyn DocumentStore> = service;
            Ok((storage, documents))
        }
        Provider::Local => {
            let service = Arc::new(LocalStorageService::new(&config.local_storage_dir).await?);
            let storage: Arc<dyn StorageService> = service.clone();
            let documents: Arc<dyn DocumentStore> = service;
            Ok((storage, documents))
        }
    }
}
