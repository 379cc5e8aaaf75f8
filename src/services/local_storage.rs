use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use uuid::Uuid;

use crate::{
    application::{
        error::ApplicationError,
        services::{document_store::DocumentStore, storage_service::StorageService},
    },
    domain::models::file::{sanitize_filename, FileData, StorageLocator},
    services::error::StorageError,
};

const OBJECTS_DIR: &str = "objects";
const DOCUMENTS_DIR: &str = "db";

/// Stores objects and JSON documents under one directory. Objects are served
/// through the download endpoint, so locators carry no public URL.
pub struct LocalStorageService {
    root: PathBuf,
}

impl LocalStorageService {
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(root.join(OBJECTS_DIR)).await?;
        fs::create_dir_all(root.join(DOCUMENTS_DIR)).await?;
        Ok(Self { root })
    }

    fn object_path(&self, public_id: &str) -> Result<PathBuf, StorageError> {
        // Ids are generated here; anything with a separator did not come from us.
        if public_id.is_empty()
            || public_id.contains(['/', '\\'])
            || public_id.starts_with('.')
        {
            return Err(StorageError::NotFound(public_id.to_string()));
        }
        Ok(self.root.join(OBJECTS_DIR).join(public_id))
    }

    fn document_path(&self, name: &str) -> PathBuf {
        self.root.join(DOCUMENTS_DIR).join(sanitize_filename(name))
    }

    async fn directory_size(dir: &Path) -> Result<u64, StorageError> {
        let mut total = 0;
        let mut entries = fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if metadata.is_file() {
                total += metadata.len();
            }
        }
        Ok(total)
    }
}

fn not_found_or(error: std::io::Error, public_id: &str) -> StorageError {
    if error.kind() == ErrorKind::NotFound {
        StorageError::NotFound(public_id.to_string())
    } else {
        StorageError::Io(error)
    }
}

#[async_trait]
impl StorageService for LocalStorageService {
    async fn upload(&self, file_data: FileData) -> Result<StorageLocator, ApplicationError> {
        let public_id = format!("{}-{}", Uuid::new_v4(), sanitize_filename(&file_data.filename));
        let path = self.object_path(&public_id)?;

        fs::write(&path, &file_data.content)
            .await
            .map_err(StorageError::from)?;

        Ok(StorageLocator {
            provider: "local".to_string(),
            public_id,
            resource_type: "raw".to_string(),
            url: None,
        })
    }

    async fn download(&self, locator: &StorageLocator) -> Result<Vec<u8>, ApplicationError> {
        let path = self.object_path(&locator.public_id)?;
        Ok(fs::read(&path)
            .await
            .map_err(|e| not_found_or(e, &locator.public_id))?)
    }

    async fn delete(&self, locator: &StorageLocator) -> Result<(), ApplicationError> {
        let path = self.object_path(&locator.public_id)?;
        Ok(fs::remove_file(&path)
            .await
            .map_err(|e| not_found_or(e, &locator.public_id))?)
    }

    async fn usage(&self) -> Result<u64, ApplicationError> {
        let objects = Self::directory_size(&self.root.join(OBJECTS_DIR)).await?;
        let documents = Self::directory_size(&self.root.join(DOCUMENTS_DIR)).await?;
        Ok(objects + documents)
    }
}

#[async_trait]
impl DocumentStore for LocalStorageService {
    async fn load(&self, name: &str) -> Result<Option<Vec<u8>>, ApplicationError> {
        match fs::read(self.document_path(name)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ApplicationError::PersistenceError(format!(
                "Cannot read {}: {}",
                name, e
            ))),
        }
    }

    /// Writes to a sibling temp file and renames, so a crash never leaves half a document.
    async fn save(&self, name: &str, content: Vec<u8>) -> Result<(), ApplicationError> {
        let path = self.document_path(name);
        let tmp = path.with_extension("tmp");

        fs::write(&tmp, content).await.map_err(|e| {
            ApplicationError::PersistenceError(format!("Cannot write {}: {}", name, e))
        })?;
        fs::rename(&tmp, &path).await.map_err(|e| {
            ApplicationError::PersistenceError(format!("Cannot replace {}: {}", name, e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::document_store::FILES_DOCUMENT;

    async fn service() -> (LocalStorageService, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let service = LocalStorageService::new(dir.path()).await.unwrap();
        (service, dir)
    }

    #[tokio::test]
    async fn objects_round_trip_and_count_towards_usage() {
        let (service, _dir) = service().await;

        let locator = service
            .upload(FileData::new(vec![1; 64], "a b.txt".into(), "text/plain".into()))
            .await
            .unwrap();
        assert!(locator.public_id.ends_with("-a_b.txt"));
        assert_eq!(locator.url, None);

        assert_eq!(service.download(&locator).await.unwrap(), vec![1; 64]);
        assert_eq!(service.usage().await.unwrap(), 64);

        service.delete(&locator).await.unwrap();
        assert_eq!(service.usage().await.unwrap(), 0);
        assert!(matches!(
            service.delete(&locator).await,
            Err(ApplicationError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn rejects_path_traversal() {
        let (service, _dir) = service().await;
        let locator = StorageLocator {
            provider: "local".into(),
            public_id: "../secrets".into(),
            resource_type: "raw".into(),
            url: None,
        };
        assert!(matches!(
            service.download(&locator).await,
            Err(ApplicationError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn documents_are_replaced_whole() {
        let (service, _dir) = service().await;

        assert!(service.load(FILES_DOCUMENT).await.unwrap().is_none());
        service.save(FILES_DOCUMENT, b"{}".to_vec()).await.unwrap();
        service.save(FILES_DOCUMENT, b"{\"a\":1}".to_vec()).await.unwrap();
        assert_eq!(
            service.load(FILES_DOCUMENT).await.unwrap(),
            Some(b"{\"a\":1}".to_vec())
        );
    }
}
