use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use chrono::{Duration, Utc};

use crate::{
    adapters::{
        repositories::{JsonAccountRepository, JsonFileRepository},
        session::SessionService,
        state::AppState,
    },
    application::{
        error::ApplicationError,
        repositories::account_repository::AccountRepository,
        services::{
            access_ledger::AccessLedger,
            account_service::AccountService,
            authentication::Authenticator,
            capacity_gate::{CapacityGate, CapacityThresholds},
            document_store::DocumentStore,
            file_lifecycle::FileLifecycle,
            ip_block_list::IpBlockList,
            lockout_tracker::{LockoutPolicy, LockoutTracker},
            login_service::LoginService,
            notification_ledger::NotificationLedger,
            storage_service::StorageService,
        },
    },
    domain::{
        config::local::{Provider, ServerConfig},
        models::{
            file::{FileData, StorageLocator},
            identity::{AdminRole, AdminRoster, AdministratorIdentity},
            user::Account,
        },
    },
};

/// In-memory storage provider. Usage is the sum of stored objects plus a
/// configurable baseline standing in for unrelated data in the bucket.
#[derive(Default)]
pub struct MockStorage {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    documents: Mutex<HashMap<String, Vec<u8>>>,
    baseline: AtomicU64,
    next_id: AtomicU64,
    usage_queries: AtomicU64,
    document_saves: AtomicU64,
    fail_usage: AtomicBool,
    fail_deletes: AtomicBool,
    fail_saves: AtomicBool,
}

impl MockStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_baseline(&self, bytes: u64) {
        self.baseline.store(bytes, Ordering::SeqCst);
    }

    pub fn fail_usage(&self, fail: bool) {
        self.fail_usage.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub fn usage_queries(&self) -> u64 {
        self.usage_queries.load(Ordering::SeqCst)
    }

    pub fn document_saves(&self) -> u64 {
        self.document_saves.load(Ordering::SeqCst)
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn has_object(&self, public_id: &str) -> bool {
        self.objects.lock().unwrap().contains_key(public_id)
    }

    pub fn document(&self, name: &str) -> Option<Vec<u8>> {
        self.documents.lock().unwrap().get(name).cloned()
    }

    pub fn put_document(&self, name: &str, content: Vec<u8>) {
        self.documents
            .lock()
            .unwrap()
            .insert(name.to_string(), content);
    }
}

#[async_trait]
impl StorageService for MockStorage {
    async fn upload(&self, file_data: FileData) -> Result<StorageLocator, ApplicationError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let public_id = format!("mock/{}-{}", id, file_data.filename);
        self.objects
            .lock()
            .unwrap()
            .insert(public_id.clone(), file_data.content);

        Ok(StorageLocator {
            provider: "mock".to_string(),
            public_id,
            resource_type: "raw".to_string(),
            url: None,
        })
    }

    async fn download(&self, locator: &StorageLocator) -> Result<Vec<u8>, ApplicationError> {
        self.objects
            .lock()
            .unwrap()
            .get(&locator.public_id)
            .cloned()
            .ok_or_else(|| ApplicationError::NotFound(locator.public_id.clone()))
    }

    async fn delete(&self, locator: &StorageLocator) -> Result<(), ApplicationError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(ApplicationError::InternalError("delete failed".to_string()));
        }
        self.objects
            .lock()
            .unwrap()
            .remove(&locator.public_id)
            .map(|_| ())
            .ok_or_else(|| ApplicationError::NotFound(locator.public_id.clone()))
    }

    async fn usage(&self) -> Result<u64, ApplicationError> {
        self.usage_queries.fetch_add(1, Ordering::SeqCst);
        if self.fail_usage.load(Ordering::SeqCst) {
            return Err(ApplicationError::InternalError("usage unavailable".to_string()));
        }
        let stored: u64 = self
            .objects
            .lock()
            .unwrap()
            .values()
            .map(|v| v.len() as u64)
            .sum();
        Ok(stored + self.baseline.load(Ordering::SeqCst))
    }
}

#[async_trait]
impl DocumentStore for MockStorage {
    async fn load(&self, name: &str) -> Result<Option<Vec<u8>>, ApplicationError> {
        Ok(self.document(name))
    }

    async fn save(&self, name: &str, content: Vec<u8>) -> Result<(), ApplicationError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(ApplicationError::PersistenceError("save failed".to_string()));
        }
        self.document_saves.fetch_add(1, Ordering::SeqCst);
        self.put_document(name, content);
        Ok(())
    }
}

pub fn roster() -> AdminRoster {
    AdminRoster::new(vec![
        AdministratorIdentity::new("root".into(), "root-pass".into(), AdminRole::Owner),
        AdministratorIdentity::new("ops".into(), "ops-pass".into(), AdminRole::Admin),
    ])
    .unwrap()
}

pub async fn repositories(
    storage: &Arc<MockStorage>,
) -> (Arc<JsonFileRepository>, Arc<JsonAccountRepository>) {
    let documents: Arc<dyn DocumentStore> = storage.clone();
    let files = JsonFileRepository::load(documents.clone()).await.unwrap();
    let accounts = JsonAccountRepository::load(documents).await.unwrap();
    (Arc::new(files), Arc::new(accounts))
}

/// Fully wired state over `storage`, with member `alice` already signed up.
pub async fn app_state(storage: &Arc<MockStorage>, max_upload_bytes: u64) -> AppState {
    let (files, accounts) = repositories(storage).await;
    accounts
        .create(Account::new("alice".into(), "h".into(), "Alice".into(), Utc::now()))
        .await
        .unwrap();

    let notifications = Arc::new(NotificationLedger::default());
    let ip_blocks = Arc::new(IpBlockList::new(Duration::minutes(30), notifications.clone()));
    let access_ledger = Arc::new(AccessLedger::new(ip_blocks.clone(), notifications.clone()));
    let gate = Arc::new(CapacityGate::new(
        storage.clone(),
        notifications.clone(),
        u64::MAX,
        CapacityThresholds::default(),
    ));
    let file_lifecycle = Arc::new(FileLifecycle::new(
        files.clone(),
        accounts.clone(),
        storage.clone(),
        gate,
        max_upload_bytes,
    ));
    let login_service = Arc::new(LoginService::new(
        ip_blocks.clone(),
        Arc::new(LockoutTracker::new(LockoutPolicy::default())),
        Arc::new(Authenticator::new(roster(), accounts.clone())),
        access_ledger.clone(),
        accounts.clone(),
    ));

    AppState {
        started_at: Utc::now(),
        server_config: Arc::new(ServerConfig {
            port: 3000,
            provider: Provider::Local,
            local_storage_dir: std::path::PathBuf::from("/tmp"),
            public_base_url: "http://localhost:3000".to_string(),
            cors_allowed_origins: None,
            trust_proxy: false,
        }),
        sessions: Arc::new(SessionService::new("test-secret", Duration::hours(1))),
        file_lifecycle,
        login_service,
        account_service: Arc::new(AccountService::new(accounts, files, roster())),
        access_ledger,
        ip_blocks,
        notifications,
    }
}
