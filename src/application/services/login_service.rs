use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::{
    application::{
        error::ApplicationError,
        repositories::account_repository::AccountRepository,
        services::{
            access_ledger::AccessLedger,
            authentication::Authenticator,
            ip_block_list::IpBlockList,
            lockout_tracker::{FailedLoginOutcome, LockoutTracker},
        },
    },
    domain::models::{
        identity::{Identity, Role},
        security::AdminLoginRequest,
    },
};

#[derive(Debug, Clone)]
pub enum LoginOutcome {
    Granted(Identity),
    /// Non-owner administrators wait for the owner to approve the request.
    PendingApproval(AdminLoginRequest),
}

pub struct LoginService {
    ip_blocks: Arc<IpBlockList>,
    lockouts: Arc<LockoutTracker>,
    authenticator: Arc<Authenticator>,
    ledger: Arc<AccessLedger>,
    accounts: Arc<dyn AccountRepository>,
}

impl LoginService {
    pub fn new(
        ip_blocks: Arc<IpBlockList>,
        lockouts: Arc<LockoutTracker>,
        authenticator: Arc<Authenticator>,
        ledger: Arc<AccessLedger>,
        accounts: Arc<dyn AccountRepository>,
    ) -> Self {
        Self {
            ip_blocks,
            lockouts,
            authenticator,
            ledger,
            accounts,
        }
    }

    pub async fn login(
        &self,
        username: &str,
        password: &str,
        source_ip: &str,
    ) -> Result<LoginOutcome, ApplicationError> {
        self.login_at(username, password, source_ip, Utc::now()).await
    }

    /// IP block, then account lock, then credentials.
    pub async fn login_at(
        &self,
        username: &str,
        password: &str,
        source_ip: &str,
        now: DateTime<Utc>,
    ) -> Result<LoginOutcome, ApplicationError> {
        self.ip_blocks.ensure_allowed_at(source_ip, now).await?;
        self.lockouts.check_at(username, now).await?;

        let identity = match self.authenticator.authenticate(username, password).await {
            Ok(identity) => identity,
            Err(ApplicationError::InvalidCredentials { .. }) => {
                return Err(self.failed(username, now).await);
            }
            Err(e) => return Err(e),
        };

        self.lockouts.reset(username).await;

        match identity.role() {
            Role::User => {
                self.accounts.touch(username, now).await?;
                if let Err(e) = self.accounts.persist().await {
                    warn!("Failed to persist activity for {}: {}", username, e);
                }
                info!("User {} logged in", username);
                Ok(LoginOutcome::Granted(identity))
            }
            Role::Owner => {
                info!("Owner {} logged in", username);
                Ok(LoginOutcome::Granted(identity))
            }
            Role::Admin => {
                let request = self
                    .ledger
                    .create_admin_login_request(username, source_ip, now)
                    .await;
                Ok(LoginOutcome::PendingApproval(request))
            }
        }
    }

    async fn failed(&self, username: &str, now: DateTime<Utc>) -> ApplicationError {
        match self.lockouts.record_failure_at(username, now).await {
            FailedLoginOutcome::RemainingAttempts(remaining) => {
                ApplicationError::InvalidCredentials {
                    remaining_attempts: Some(remaining),
                }
            }
            FailedLoginOutcome::Locked { duration, .. } => ApplicationError::AccountLocked {
                remaining_minutes: duration.num_minutes(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        application::services::{
            lockout_tracker::LockoutPolicy, notification_ledger::NotificationLedger,
            password::hash_password,
        },
        domain::models::{security::AdminLoginStatus, user::Account},
        test_support::{repositories, roster, MockStorage},
    };
    use chrono::Duration;

    struct Fixture {
        service: LoginService,
        ip_blocks: Arc<IpBlockList>,
        lockouts: Arc<LockoutTracker>,
        accounts: Arc<dyn AccountRepository>,
    }

    async fn fixture() -> Fixture {
        let storage = Arc::new(MockStorage::new());
        let (_, accounts) = repositories(&storage).await;
        let accounts: Arc<dyn AccountRepository> = accounts;
        let created = Utc::now() - Duration::days(3);
        accounts
            .create(Account::new(
                "alice".into(),
                hash_password("alice-pass").unwrap(),
                "Alice".into(),
                created,
            ))
            .await
            .unwrap();

        let notifications = Arc::new(NotificationLedger::default());
        let ip_blocks = Arc::new(IpBlockList::new(Duration::minutes(30), notifications.clone()));
        let lockouts = Arc::new(LockoutTracker::new(LockoutPolicy::default()));
        let ledger = Arc::new(AccessLedger::new(ip_blocks.clone(), notifications));
        let authenticator = Arc::new(Authenticator::new(roster(), accounts.clone()));

        Fixture {
            service: LoginService::new(
                ip_blocks.clone(),
                lockouts.clone(),
                authenticator,
                ledger,
                accounts.clone(),
            ),
            ip_blocks,
            lockouts,
            accounts,
        }
    }

    #[tokio::test]
    async fn member_login_refreshes_activity() {
        let f = fixture().await;
        let now = Utc::now();

        let outcome = f.service.login_at("alice", "alice-pass", "1.1.1.1", now).await.unwrap();
        assert!(matches!(outcome, LoginOutcome::Granted(Identity::Member { .. })));
        assert_eq!(f.accounts.get("alice").await.unwrap().last_activity_at, Some(now));
    }

    #[tokio::test]
    async fn sixth_attempt_is_locked_even_with_correct_password() {
        let f = fixture().await;
        let now = Utc::now();

        for expected in (1..=4).rev() {
            match f.service.login_at("alice", "nope", "1.1.1.1", now).await {
                Err(ApplicationError::InvalidCredentials { remaining_attempts }) => {
                    assert_eq!(remaining_attempts, Some(expected))
                }
                other => panic!("unexpected {:?}", other),
            }
        }

        assert!(matches!(
            f.service.login_at("alice", "nope", "1.1.1.1", now).await,
            Err(ApplicationError::AccountLocked { remaining_minutes: 10 })
        ));
        assert!(matches!(
            f.service.login_at("alice", "alice-pass", "1.1.1.1", now).await,
            Err(ApplicationError::AccountLocked { .. })
        ));

        let later = now + Duration::minutes(10);
        let outcome = f.service.login_at("alice", "alice-pass", "1.1.1.1", later).await;
        assert!(matches!(outcome, Ok(LoginOutcome::Granted(_))));
        assert_eq!(f.lockouts.state("alice").await.unwrap().failure_count, 0);
    }

    #[tokio::test]
    async fn unknown_user_is_not_counted() {
        let f = fixture().await;
        assert!(matches!(
            f.service.login_at("ghost", "x", "1.1.1.1", Utc::now()).await,
            Err(ApplicationError::UserNotFound)
        ));
        assert!(f.lockouts.state("ghost").await.is_none());
    }

    #[tokio::test]
    async fn blocked_ip_is_rejected_before_credentials() {
        let f = fixture().await;
        let now = Utc::now();
        f.ip_blocks.block_at("6.6.6.6", "test", false, now).await;

        assert!(matches!(
            f.service.login_at("alice", "alice-pass", "6.6.6.6", now).await,
            Err(ApplicationError::IpBlocked)
        ));
        assert!(f.service.login_at("alice", "alice-pass", "7.7.7.7", now).await.is_ok());
    }

    #[tokio::test]
    async fn owner_logs_in_directly_admin_waits() {
        let f = fixture().await;
        let now = Utc::now();

        let owner = f.service.login_at("root", "root-pass", "1.1.1.1", now).await.unwrap();
        assert!(matches!(owner, LoginOutcome::Granted(ref id) if id.is_owner()));

        match f.service.login_at("ops", "ops-pass", "2.2.2.2", now).await.unwrap() {
            LoginOutcome::PendingApproval(request) => {
                assert_eq!(request.status, AdminLoginStatus::Pending);
                assert_eq!(request.source_ip, "2.2.2.2");
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
