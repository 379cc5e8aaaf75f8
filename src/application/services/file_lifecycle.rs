use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::{
    application::{
        error::ApplicationError,
        repositories::{
            account_repository::AccountRepository,
            file_repository::{FileRepository, ViewOutcome},
        },
        services::{
            capacity_gate::CapacityGate, share_code::generate_share_code,
            storage_service::StorageService,
        },
    },
    domain::models::{
        file::{FileData, StorageLocator},
        identity::Identity,
        metadata::FileRecord,
        user::Account,
    },
};

const MAX_CODE_ATTEMPTS: usize = 16;

/// Owns every transition of a `FileRecord`: admission, lookups, owner
/// deletion, expiry and cascade deletion.
pub struct FileLifecycle {
    files: Arc<dyn FileRepository>,
    accounts: Arc<dyn AccountRepository>,
    storage: Arc<dyn StorageService>,
    gate: Arc<CapacityGate>,
    max_upload_bytes: u64,
}

impl FileLifecycle {
    pub fn new(
        files: Arc<dyn FileRepository>,
        accounts: Arc<dyn AccountRepository>,
        storage: Arc<dyn StorageService>,
        gate: Arc<CapacityGate>,
        max_upload_bytes: u64,
    ) -> Self {
        Self {
            files,
            accounts,
            storage,
            gate,
            max_upload_bytes,
        }
    }

    pub fn gate(&self) -> &Arc<CapacityGate> {
        &self.gate
    }

    pub async fn upload(
        self: &Arc<Self>,
        file_data: FileData,
        uploader: &Identity,
    ) -> Result<FileRecord, ApplicationError> {
        self.upload_at(file_data, uploader, Utc::now()).await
    }

    pub async fn upload_at(
        self: &Arc<Self>,
        file_data: FileData,
        uploader: &Identity,
        now: DateTime<Utc>,
    ) -> Result<FileRecord, ApplicationError> {
        if !file_data.validate_size(self.max_upload_bytes) {
            return Err(ApplicationError::PayloadTooLarge);
        }

        // Activity is recorded before any transfer so the reaper never sees
        // an uploading account as idle.
        let owner = uploader.owning_account();
        if let Some(owner) = owner {
            self.accounts.touch(owner, now).await?;
        }

        let size = file_data.size();
        self.gate.check_before_upload(size).await?;

        let original_name = file_data.filename.clone();
        let mime_type = file_data.mime_type.clone();
        let locator = self.storage.upload(file_data).await?;

        let record = match self
            .register_at(original_name, size, mime_type, locator.clone(), owner, now)
            .await
        {
            Ok(record) => record,
            Err(e) => {
                // Roll back the transferred object, the record never became visible.
                self.discard(&locator).await;
                return Err(e);
            }
        };

        if owner.is_some() {
            self.persist_accounts().await;
        }
        self.persist_files().await;

        self.schedule_expiry(&record);

        info!(
            "File uploaded: {} ({} bytes, code {}, expires {})",
            record.original_name, record.size, record.code, record.expires_at
        );

        Ok(record)
    }

    /// Issues a unique code, inserts the record and links it to its owner.
    pub async fn register_at(
        &self,
        original_name: String,
        size: u64,
        mime_type: String,
        locator: StorageLocator,
        owner: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<FileRecord, ApplicationError> {
        self.register_with(
            original_name,
            size,
            mime_type,
            locator,
            owner,
            now,
            generate_share_code,
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn register_with<F>(
        &self,
        original_name: String,
        size: u64,
        mime_type: String,
        locator: StorageLocator,
        owner: Option<&str>,
        now: DateTime<Utc>,
        mut next_code: F,
    ) -> Result<FileRecord, ApplicationError>
    where
        F: FnMut() -> String + Send,
    {
        for _ in 0..MAX_CODE_ATTEMPTS {
            let record = FileRecord::new(
                next_code(),
                original_name.clone(),
                size,
                mime_type.clone(),
                locator.clone(),
                owner.map(str::to_string),
                now,
            );
            let code = record.code.clone();

            if !self.files.insert_if_absent(record.clone()).await? {
                warn!("Share code collision on {}, regenerating", code);
                continue;
            }

            if let Some(owner) = owner {
                if let Err(e) = self.accounts.add_file(owner, &code).await {
                    self.files.remove(&code).await.ok();
                    return Err(e);
                }
            }

            return Ok(record);
        }

        error!("No free share code after {} attempts", MAX_CODE_ATTEMPTS);
        Err(ApplicationError::InternalError(
            "Could not allocate a share code".to_string(),
        ))
    }

    /// One-shot timer for a single record. The periodic sweep stays the
    /// source of truth; this only shortens the time an expired file lingers.
    pub fn schedule_expiry(self: &Arc<Self>, record: &FileRecord) {
        let delay = (record.expires_at - Utc::now())
            .to_std()
            .unwrap_or_default();
        let lifecycle = Arc::clone(self);
        let code = record.code.clone();

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match lifecycle.sweep_expired().await {
                Ok(removed) if removed > 0 => {
                    info!("Expiry timer for {} removed {} file(s)", code, removed)
                }
                Ok(_) => {}
                Err(e) => warn!("Expiry timer for {} failed: {}", code, e),
            }
        });
    }

    pub async fn reload_timers(self: &Arc<Self>) -> Result<usize, ApplicationError> {
        let records = self.files.list().await?;
        for record in &records {
            self.schedule_expiry(record);
        }
        Ok(records.len())
    }

    pub async fn lookup(&self, code: &str) -> Result<FileRecord, ApplicationError> {
        self.lookup_at(code, Utc::now()).await
    }

    /// Info lookup. Counts a view, or removes the record if it is already due.
    pub async fn lookup_at(
        &self,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<FileRecord, ApplicationError> {
        match self.files.record_view(code, now).await? {
            ViewOutcome::Viewed(record) => {
                self.persist_files_detached();
                Ok(record)
            }
            ViewOutcome::Expired(record) => {
                info!("File {} expired on lookup", record.code);
                self.release(&record).await;
                self.persist_files().await;
                if let Err(e) = self.gate.try_auto_unlock().await {
                    warn!("Auto-unlock check failed: {}", e);
                }
                Err(ApplicationError::NotFound(format!(
                    "File {} not found",
                    code
                )))
            }
        }
    }

    /// Counts a download and returns the record whose locator the caller serves.
    pub async fn download(&self, code: &str) -> Result<FileRecord, ApplicationError> {
        let record = self.files.record_download(code).await?;
        self.persist_files_detached();
        info!("File downloaded: {} (code {})", record.original_name, code);
        Ok(record)
    }

    pub async fn fetch_content(&self, record: &FileRecord) -> Result<Vec<u8>, ApplicationError> {
        self.storage.download(&record.storage_locator).await
    }

    pub async fn delete_owned(
        &self,
        code: &str,
        caller: &Identity,
    ) -> Result<FileRecord, ApplicationError> {
        let owner = caller.owning_account().ok_or_else(|| {
            ApplicationError::Forbidden("Only the uploader can delete this file".to_string())
        })?;

        let record = self.files.remove_owned(code, owner).await?;
        self.release(&record).await;
        self.persist_files().await;

        if let Err(e) = self.gate.try_auto_unlock().await {
            warn!("Auto-unlock check failed: {}", e);
        }

        info!("File deleted: {} (code {})", record.original_name, code);
        Ok(record)
    }

    pub async fn sweep_expired(&self) -> Result<usize, ApplicationError> {
        self.sweep_expired_at(Utc::now()).await
    }

    /// Removes every due record, then lets the capacity gate re-evaluate.
    pub async fn sweep_expired_at(&self, now: DateTime<Utc>) -> Result<usize, ApplicationError> {
        let expired = self.files.take_expired(now).await?;
        if expired.is_empty() {
            return Ok(0);
        }

        for record in &expired {
            info!("File expired: {} (code {})", record.original_name, record.code);
            self.release(record).await;
        }
        self.persist_files().await;

        if let Err(e) = self.gate.try_auto_unlock().await {
            warn!("Auto-unlock check failed: {}", e);
        }

        Ok(expired.len())
    }

    /// Deletes every file an account owns, including records attributed to it
    /// that never made it into `owned_file_codes`. Storage failures are logged only.
    pub async fn cascade_delete(&self, account: &Account) -> Result<usize, ApplicationError> {
        let mut codes = account.owned_file_codes.clone();
        codes.extend(
            self.files
                .list_by_owner(&account.username)
                .await?
                .into_iter()
                .map(|record| record.code),
        );

        let mut removed = 0;
        for code in &codes {
            match self.files.remove(code).await {
                Ok(record) => {
                    self.discard(&record.storage_locator).await;
                    removed += 1;
                }
                Err(ApplicationError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }

        if removed > 0 {
            self.persist_files().await;
            if let Err(e) = self.gate.try_auto_unlock().await {
                warn!("Auto-unlock check failed: {}", e);
            }
        }

        Ok(removed)
    }

    pub async fn list_all(&self) -> Result<Vec<FileRecord>, ApplicationError> {
        let mut files = self.files.list().await?;
        files.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        Ok(files)
    }

    pub async fn count(&self) -> Result<usize, ApplicationError> {
        self.files.count().await
    }

    /// Storage delete plus unlinking from the owner, for a record already removed.
    async fn release(&self, record: &FileRecord) {
        self.discard(&record.storage_locator).await;

        if let Some(owner) = &record.uploaded_by {
            if let Err(e) = self.accounts.remove_file(owner, &record.code).await {
                warn!("Failed to unlink {} from {}: {}", record.code, owner, e);
            }
            self.persist_accounts().await;
        }
    }

    async fn discard(&self, locator: &StorageLocator) {
        if let Err(e) = self.storage.delete(locator).await {
            warn!("Failed to delete {} from storage: {}", locator.public_id, e);
        }
    }

    async fn persist_files(&self) {
        if let Err(e) = self.files.persist().await {
            error!("Failed to persist file table: {}", e);
        }
    }

    async fn persist_accounts(&self) {
        if let Err(e) = self.accounts.persist().await {
            error!("Failed to persist account table: {}", e);
        }
    }

    fn persist_files_detached(&self) {
        let files = Arc::clone(&self.files);
        tokio::spawn(async move {
            if let Err(e) = files.persist().await {
                error!("Failed to persist file table: {}", e);
            }
        });
    }
}
