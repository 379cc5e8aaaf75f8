use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use tracing::info;

use crate::{
    application::{
        error::ApplicationError,
        repositories::file_repository::{FileRepository, ViewOutcome},
        services::document_store::{DocumentStore, FILES_DOCUMENT},
    },
    domain::models::metadata::FileRecord,
};

/// File table held in memory and snapshotted wholesale as `files.json`.
pub struct JsonFileRepository {
    records: RwLock<BTreeMap<String, FileRecord>>,
    documents: Arc<dyn DocumentStore>,
    persist_lock: Mutex<()>,
}

impl JsonFileRepository {
    pub async fn load(documents: Arc<dyn DocumentStore>) -> Result<Self, ApplicationError> {
        let records = match documents.load(FILES_DOCUMENT).await? {
            Some(bytes) => serde_json::from_slice::<BTreeMap<String, FileRecord>>(&bytes)
                .map_err(|e| {
                    ApplicationError::PersistenceError(format!("Corrupt {}: {}", FILES_DOCUMENT, e))
                })?,
            None => BTreeMap::new(),
        };

        info!("Loaded {} file record(s) from {}", records.len(), FILES_DOCUMENT);

        Ok(Self {
            records: RwLock::new(records),
            documents,
            persist_lock: Mutex::new(()),
        })
    }

    fn not_found(code: &str) -> ApplicationError {
        ApplicationError::NotFound(format!("File {} not found", code))
    }
}

#[async_trait]
impl FileRepository for JsonFileRepository {
    async fn insert_if_absent(&self, record: FileRecord) -> Result<bool, ApplicationError> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.code) {
            return Ok(false);
        }
        records.insert(record.code.clone(), record);
        Ok(true)
    }

    async fn get(&self, code: &str) -> Result<FileRecord, ApplicationError> {
        self.records
            .read()
            .await
            .get(code)
            .cloned()
            .ok_or_else(|| Self::not_found(code))
    }

    async fn contains(&self, code: &str) -> Result<bool, ApplicationError> {
        Ok(self.records.read().await.contains_key(code))
    }

    async fn record_view(
        &self,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<ViewOutcome, ApplicationError> {
        let mut records = self.records.write().await;

        let expired = match records.get(code) {
            Some(record) => record.is_expired_at(now),
            None => return Err(Self::not_found(code)),
        };

        if expired {
            let record = records.remove(code).ok_or_else(|| Self::not_found(code))?;
            return Ok(ViewOutcome::Expired(record));
        }

        let record = records.get_mut(code).ok_or_else(|| Self::not_found(code))?;
        record.view_count += 1;
        Ok(ViewOutcome::Viewed(record.clone()))
    }

    async fn record_download(&self, code: &str) -> Result<FileRecord, ApplicationError> {
        let mut records = self.records.write().await;
        let record = records.get_mut(code).ok_or_else(|| Self::not_found(code))?;
        record.download_count += 1;
        Ok(record.clone())
    }

    async fn remove(&self, code: &str) -> Result<FileRecord, ApplicationError> {
        self.records
            .write()
            .await
            .remove(code)
            .ok_or_else(|| Self::not_found(code))
    }

    async fn remove_owned(&self, code: &str, owner: &str) -> Result<FileRecord, ApplicationError> {
        let mut records = self.records.write().await;

        let owned = records
            .get(code)
            .map(|record| record.is_owned_by(owner))
            .ok_or_else(|| Self::not_found(code))?;

        if !owned {
            return Err(ApplicationError::Forbidden(
                "Only the uploader can delete this file".to_string(),
            ));
        }

        records.remove(code).ok_or_else(|| Self::not_found(code))
    }

    async fn take_expired(&self, now: DateTime<Utc>) -> Result<Vec<FileRecord>, ApplicationError> {
        let mut records = self.records.write().await;

        let codes: Vec<String> = records
            .values()
            .filter(|record| record.is_expired_at(now))
            .map(|record| record.code.clone())
            .collect();

        Ok(codes
            .iter()
            .filter_map(|code| records.remove(code))
            .collect())
    }

    async fn list(&self) -> Result<Vec<FileRecord>, ApplicationError> {
        Ok(self.records.read().await.values().cloned().collect())
    }

    async fn list_by_owner(&self, owner: &str) -> Result<Vec<FileRecord>, ApplicationError> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .filter(|record| record.is_owned_by(owner))
            .cloned()
            .collect())
    }

    async fn count(&self) -> Result<usize, ApplicationError> {
        Ok(self.records.read().await.len())
    }

    async fn persist(&self) -> Result<(), ApplicationError> {
        // Serialises writers so an older snapshot never lands after a newer one.
        let _guard = self.persist_lock.lock().await;

        let content = {
            let records = self.records.read().await;
            serde_json::to_vec_pretty(&*records).map_err(|e| {
                ApplicationError::PersistenceError(format!("Cannot encode {}: {}", FILES_DOCUMENT, e))
            })?
        };

        self.documents.save(FILES_DOCUMENT, content).await
    }
}
