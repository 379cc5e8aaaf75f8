use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::{
    application::{dto::user_dto::UserDTO, error::ApplicationError},
    domain::models::user::Account,
};

#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Fails with `AlreadyExists` when the username is taken.
    async fn create(&self, account: Account) -> Result<Account, ApplicationError>;
    /// Fails with `UserNotFound` when absent.
    async fn get(&self, username: &str) -> Result<Account, ApplicationError>;
    async fn update(&self, username: &str, changes: UserDTO) -> Result<Account, ApplicationError>;
    async fn touch(&self, username: &str, now: DateTime<Utc>) -> Result<(), ApplicationError>;
    async fn add_file(&self, username: &str, code: &str) -> Result<(), ApplicationError>;
    /// No-op when the account or the code is already gone.
    async fn remove_file(&self, username: &str, code: &str) -> Result<(), ApplicationError>;
    async fn remove(&self, username: &str) -> Result<Account, ApplicationError>;
    /// Removes the account only if it has still been idle for `window` at
    /// `now`, checked under the same lock as the removal. `None` means it
    /// is gone or active again.
    async fn remove_if_inactive(
        &self,
        username: &str,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Result<Option<Account>, ApplicationError>;
    async fn list(&self) -> Result<Vec<Account>, ApplicationError>;
    async fn persist(&self) -> Result<(), ApplicationError>;
}
