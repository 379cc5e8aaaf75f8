use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::{Mutex, RwLock};
use tracing::info;

use crate::{
    application::{
        dto::user_dto::UserDTO,
        error::ApplicationError,
        repositories::account_repository::AccountRepository,
        services::document_store::{DocumentStore, USERS_DOCUMENT},
    },
    domain::models::user::Account,
};

/// Account table held in memory and snapshotted wholesale as `users.json`.
pub struct JsonAccountRepository {
    accounts: RwLock<BTreeMap<String, Account>>,
    documents: Arc<dyn DocumentStore>,
    persist_lock: Mutex<()>,
}

impl JsonAccountRepository {
    pub async fn load(documents: Arc<dyn DocumentStore>) -> Result<Self, ApplicationError> {
        let accounts = match documents.load(USERS_DOCUMENT).await? {
            Some(bytes) => serde_json::from_slice::<BTreeMap<String, Account>>(&bytes)
                .map_err(|e| {
                    ApplicationError::PersistenceError(format!("Corrupt {}: {}", USERS_DOCUMENT, e))
                })?,
            None => BTreeMap::new(),
        };

        info!("Loaded {} account(s) from {}", accounts.len(), USERS_DOCUMENT);

        Ok(Self {
            accounts: RwLock::new(accounts),
            documents,
            persist_lock: Mutex::new(()),
        })
    }
}

#[async_trait]
impl AccountRepository for JsonAccountRepository {
    async fn create(&self, account: Account) -> Result<Account, ApplicationError> {
        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(&account.username) {
            return Err(ApplicationError::AlreadyExists(format!(
                "Username {} is taken",
                account.username
            )));
        }
        accounts.insert(account.username.clone(), account.clone());
        Ok(account)
    }

    async fn get(&self, username: &str) -> Result<Account, ApplicationError> {
        self.accounts
            .read()
            .await
            .get(username)
            .cloned()
            .ok_or(ApplicationError::UserNotFound)
    }

    async fn update(&self, username: &str, changes: UserDTO) -> Result<Account, ApplicationError> {
        let mut accounts = self.accounts.write().await;
        let account = accounts
            .get_mut(username)
            .ok_or(ApplicationError::UserNotFound)?;
        changes.apply(account);
        Ok(account.clone())
    }

    async fn touch(&self, username: &str, now: DateTime<Utc>) -> Result<(), ApplicationError> {
        let mut accounts = self.accounts.write().await;
        let account = accounts
            .get_mut(username)
            .ok_or(ApplicationError::UserNotFound)?;
        account.last_activity_at = Some(now);
        Ok(())
    }

    async fn add_file(&self, username: &str, code: &str) -> Result<(), ApplicationError> {
        let mut accounts = self.accounts.write().await;
        let account = accounts
            .get_mut(username)
            .ok_or(ApplicationError::UserNotFound)?;
        account.owned_file_codes.insert(code.to_string());
        Ok(())
    }

    async fn remove_file(&self, username: &str, code: &str) -> Result<(), ApplicationError> {
        if let Some(account) = self.accounts.write().await.get_mut(username) {
            account.owned_file_codes.remove(code);
        }
        Ok(())
    }

    async fn remove(&self, username: &str) -> Result<Account, ApplicationError> {
        self.accounts
            .write()
            .await
            .remove(username)
            .ok_or(ApplicationError::UserNotFound)
    }

    async fn remove_if_inactive(
        &self,
        username: &str,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Result<Option<Account>, ApplicationError> {
        let mut accounts = self.accounts.write().await;
        match accounts.get(username) {
            Some(account) if account.inactive_for(now) >= window => Ok(accounts.remove(username)),
            _ => Ok(None),
        }
    }

    async fn list(&self) -> Result<Vec<Account>, ApplicationError> {
        Ok(self.accounts.read().await.values().cloned().collect())
    }

    async fn persist(&self) -> Result<(), ApplicationError> {
        let _guard = self.persist_lock.lock().await;

        let content = {
            let accounts = self.accounts.read().await;
            serde_json::to_vec_pretty(&*accounts).map_err(|e| {
                ApplicationError::PersistenceError(format!("Cannot encode {}: {}", USERS_DOCUMENT, e))
            })?
        };

        self.documents.save(USERS_DOCUMENT, content).await
    }
}
