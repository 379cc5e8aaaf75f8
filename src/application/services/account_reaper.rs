use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use crate::application::{
    error::ApplicationError, repositories::account_repository::AccountRepository,
    services::file_lifecycle::FileLifecycle,
};

/// Removes accounts idle for longer than the inactivity window, files first.
pub struct AccountReaper {
    accounts: Arc<dyn AccountRepository>,
    lifecycle: Arc<FileLifecycle>,
    inactivity_window: Duration,
}

impl AccountReaper {
    pub fn new(
        accounts: Arc<dyn AccountRepository>,
        lifecycle: Arc<FileLifecycle>,
        inactivity_window: Duration,
    ) -> Self {
        Self {
            accounts,
            lifecycle,
            inactivity_window,
        }
    }

    pub async fn reap(&self) -> Result<Vec<String>, ApplicationError> {
        self.reap_at(Utc::now()).await
    }

    pub async fn reap_at(&self, now: DateTime<Utc>) -> Result<Vec<String>, ApplicationError> {
        let candidates: Vec<_> = self
            .accounts
            .list()
            .await?
            .into_iter()
            .filter(|account| account.inactive_for(now) >= self.inactivity_window)
            .map(|account| account.username)
            .collect();

        let mut reaped = Vec::with_capacity(candidates.len());
        for username in candidates {
            // The listing is only a hint; activity since then keeps the account.
            let Some(account) = self
                .accounts
                .remove_if_inactive(&username, now, self.inactivity_window)
                .await?
            else {
                info!("Account {} became active during the sweep, kept", username);
                continue;
            };

            let files = self.lifecycle.cascade_delete(&account).await?;
            info!(
                "Reaped inactive account {} ({} file(s) removed)",
                account.username, files
            );
            reaped.push(account.username);
        }

        if !reaped.is_empty() {
            if let Err(e) = self.accounts.persist().await {
                warn!("Failed to persist account table after reaping: {}", e);
            }
        }

        Ok(reaped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::OnceLock;

    use async_trait::async_trait;

    use crate::{
        application::{
            dto::user_dto::UserDTO,
            repositories::file_repository::FileRepository,
            services::{
                capacity_gate::{CapacityGate, CapacityThresholds},
                notification_ledger::NotificationLedger,
            },
        },
        domain::models::{
            file::{FileData, StorageLocator},
            identity::Identity,
            metadata::FileRecord,
            user::Account,
        },
        test_support::{repositories, MockStorage},
    };

    fn lifecycle_over(
        storage: &Arc<MockStorage>,
        files: Arc<dyn FileRepository>,
        accounts: Arc<dyn AccountRepository>,
    ) -> Arc<FileLifecycle> {
        let gate = Arc::new(CapacityGate::new(
            storage.clone(),
            Arc::new(NotificationLedger::default()),
            u64::MAX,
            CapacityThresholds::default(),
        ));
        Arc::new(FileLifecycle::new(
            files,
            accounts,
            storage.clone(),
            gate,
            u64::MAX,
        ))
    }

    fn stale_account(username: &str, now: DateTime<Utc>) -> Account {
        let mut account = Account::new(username.into(), "h".into(), username.into(), now);
        account.last_activity_at = Some(now - Duration::days(31));
        account
    }

    /// Account table whose listing is followed by an upload from `idle`,
    /// as if the user came back while the sweep was running.
    struct UploadDuringListing {
        inner: Arc<dyn AccountRepository>,
        lifecycle: OnceLock<Arc<FileLifecycle>>,
        now: DateTime<Utc>,
    }

    #[async_trait]
    impl AccountRepository for UploadDuringListing {
        async fn create(&self, account: Account) -> Result<Account, ApplicationError> {
            self.inner.create(account).await
        }
        async fn get(&self, username: &str) -> Result<Account, ApplicationError> {
            self.inner.get(username).await
        }
        async fn update(&self, username: &str, changes: UserDTO) -> Result<Account, ApplicationError> {
            self.inner.update(username, changes).await
        }
        async fn touch(&self, username: &str, now: DateTime<Utc>) -> Result<(), ApplicationError> {
            self.inner.touch(username, now).await
        }
        async fn add_file(&self, username: &str, code: &str) -> Result<(), ApplicationError> {
            self.inner.add_file(username, code).await
        }
        async fn remove_file(&self, username: &str, code: &str) -> Result<(), ApplicationError> {
            self.inner.remove_file(username, code).await
        }
        async fn remove(&self, username: &str) -> Result<Account, ApplicationError> {
            self.inner.remove(username).await
        }
        async fn remove_if_inactive(
            &self,
            username: &str,
            now: DateTime<Utc>,
            window: Duration,
        ) -> Result<Option<Account>, ApplicationError> {
            self.inner.remove_if_inactive(username, now, window).await
        }
        async fn list(&self) -> Result<Vec<Account>, ApplicationError> {
            let snapshot = self.inner.list().await?;
            if let Some(lifecycle) = self.lifecycle.get() {
                let owner = Identity::Member {
                    username: "idle".into(),
                };
                let data = FileData::new(vec![3; 4], "late.txt".into(), "text/plain".into());
                lifecycle.upload_at(data, &owner, self.now).await?;
            }
            Ok(snapshot)
        }
        async fn persist(&self) -> Result<(), ApplicationError> {
            self.inner.persist().await
        }
    }

    #[tokio::test]
    async fn activity_after_listing_keeps_the_account() {
        let storage = Arc::new(MockStorage::new());
        let (files, inner) = repositories(&storage).await;
        let now = Utc::now();
        inner.create(stale_account("idle", now)).await.unwrap();

        let accounts = Arc::new(UploadDuringListing {
            inner,
            lifecycle: OnceLock::new(),
            now,
        });
        let lifecycle = lifecycle_over(&storage, files.clone(), accounts.clone());
        assert!(accounts.lifecycle.set(lifecycle.clone()).is_ok());

        let reaper = AccountReaper::new(accounts.clone(), lifecycle, Duration::days(30));
        assert!(reaper.reap_at(now).await.unwrap().is_empty());

        let account = accounts.get("idle").await.unwrap();
        assert_eq!(account.owned_file_codes.len(), 1);
        let live = files.list().await.unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].uploaded_by.as_deref(), Some("idle"));
        assert_eq!(storage.object_count(), 1);
    }

    #[tokio::test]
    async fn unlinked_records_of_reaped_account_are_removed() {
        let storage = Arc::new(MockStorage::new());
        let (files, accounts) = repositories(&storage).await;
        let now = Utc::now();
        accounts.create(stale_account("idle", now)).await.unwrap();

        // Attributed to the account but never added to its code set.
        let stray = FileRecord::new(
            "Zz9_-a".into(),
            "stray.bin".into(),
            16,
            "application/octet-stream".into(),
            StorageLocator {
                provider: "mock".into(),
                public_id: "stray".into(),
                resource_type: "raw".into(),
                url: None,
            },
            Some("idle".into()),
            now,
        );
        assert!(files.insert_if_absent(stray).await.unwrap());

        let lifecycle = lifecycle_over(&storage, files.clone(), accounts.clone());
        let reaper = AccountReaper::new(accounts.clone(), lifecycle.clone(), Duration::days(30));

        assert_eq!(reaper.reap_at(now).await.unwrap(), vec!["idle".to_string()]);
        assert!(matches!(
            lifecycle.lookup_at("Zz9_-a", now).await,
            Err(ApplicationError::NotFound(_))
        ));
        assert_eq!(files.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn idle_accounts_and_their_files_are_removed() {
        let storage = Arc::new(MockStorage::new());
        let (files, accounts) = repositories(&storage).await;
        let accounts: Arc<dyn AccountRepository> = accounts;
        let now = Utc::now();

        let mut idle = Account::new("idle".into(), "h".into(), "Idle".into(), now);
        idle.last_activity_at = Some(now - Duration::days(30));
        accounts.create(idle).await.unwrap();

        let mut fresh = Account::new("fresh".into(), "h".into(), "Fresh".into(), now);
        fresh.last_activity_at = Some(now - Duration::days(29));
        accounts.create(fresh).await.unwrap();

        let mut never_active = Account::new(
            "ghost".into(),
            "h".into(),
            "Ghost".into(),
            now - Duration::days(40),
        );
        never_active.last_activity_at = None;
        accounts.create(never_active).await.unwrap();

        let gate = Arc::new(CapacityGate::new(
            storage.clone(),
            Arc::new(NotificationLedger::default()),
            u64::MAX,
            CapacityThresholds::default(),
        ));
        let lifecycle = Arc::new(FileLifecycle::new(
            files,
            accounts.clone(),
            storage.clone(),
            gate,
            u64::MAX,
        ));

        let owner = Identity::Member {
            username: "idle".into(),
        };
        let data = FileData::new(vec![1; 8], "a.txt".into(), "text/plain".into());
        let record = lifecycle.upload_at(data, &owner, now).await.unwrap();
        // Uploading refreshed activity; push it back past the window.
        let mut stale = accounts.get("idle").await.unwrap();
        stale.last_activity_at = Some(now - Duration::days(31));
        accounts.remove("idle").await.unwrap();
        accounts.create(stale).await.unwrap();

        let reaper = AccountReaper::new(accounts.clone(), lifecycle.clone(), Duration::days(30));
        let mut reaped = reaper.reap_at(now).await.unwrap();
        reaped.sort();

        assert_eq!(reaped, vec!["ghost".to_string(), "idle".to_string()]);
        assert!(accounts.get("fresh").await.is_ok());
        assert!(matches!(accounts.get("idle").await, Err(ApplicationError::UserNotFound)));
        assert!(matches!(
            lifecycle.lookup_at(&record.code, now).await,
            Err(ApplicationError::NotFound(_))
        ));
        assert_eq!(storage.object_count(), 0);
    }
}
