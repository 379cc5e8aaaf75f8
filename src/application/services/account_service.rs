use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::{
    application::{
        dto::user_dto::UserDTO,
        error::ApplicationError,
        repositories::{account_repository::AccountRepository, file_repository::FileRepository},
        services::password::hash_password,
    },
    domain::models::{identity::AdminRoster, metadata::FileRecord, user::Account},
};

const USERNAME_MIN: usize = 3;
const USERNAME_MAX: usize = 32;
const PASSWORD_MIN: usize = 6;
const PASSWORD_MAX: usize = 128;
const DISPLAY_NAME_MAX: usize = 64;

fn validate_username(username: &str) -> Result<(), ApplicationError> {
    let len = username.chars().count();
    if !(USERNAME_MIN..=USERNAME_MAX).contains(&len) {
        return Err(ApplicationError::BadRequest(format!(
            "Username must be {}-{} characters",
            USERNAME_MIN, USERNAME_MAX
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        return Err(ApplicationError::BadRequest(
            "Username may only contain letters, digits, '_', '-' and '.'".to_string(),
        ));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), ApplicationError> {
    let len = password.chars().count();
    if !(PASSWORD_MIN..=PASSWORD_MAX).contains(&len) {
        return Err(ApplicationError::BadRequest(format!(
            "Password must be {}-{} characters",
            PASSWORD_MIN, PASSWORD_MAX
        )));
    }
    Ok(())
}

fn validate_display_name(display_name: &str) -> Result<(), ApplicationError> {
    if display_name.trim().is_empty() || display_name.chars().count() > DISPLAY_NAME_MAX {
        return Err(ApplicationError::BadRequest(format!(
            "Display name must be 1-{} characters",
            DISPLAY_NAME_MAX
        )));
    }
    Ok(())
}

pub struct AccountService {
    accounts: Arc<dyn AccountRepository>,
    files: Arc<dyn FileRepository>,
    roster: AdminRoster,
}

impl AccountService {
    pub fn new(
        accounts: Arc<dyn AccountRepository>,
        files: Arc<dyn FileRepository>,
        roster: AdminRoster,
    ) -> Self {
        Self {
            accounts,
            files,
            roster,
        }
    }

    pub async fn signup(
        &self,
        username: &str,
        password: &str,
        display_name: Option<String>,
    ) -> Result<Account, ApplicationError> {
        self.signup_at(username, password, display_name, Utc::now())
            .await
    }

    pub async fn signup_at(
        &self,
        username: &str,
        password: &str,
        display_name: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Account, ApplicationError> {
        validate_username(username)?;
        validate_password(password)?;

        if self.roster.contains(username) {
            return Err(ApplicationError::AlreadyExists(format!(
                "Username {} is taken",
                username
            )));
        }

        let display_name = display_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| username.to_string());
        validate_display_name(&display_name)?;

        let hash = hash_password(password)?;
        let account = self
            .accounts
            .create(Account::new(username.to_string(), hash, display_name, now))
            .await?;

        self.accounts.persist().await?;
        info!("Account {} created", account.username);

        Ok(account)
    }

    pub async fn profile(&self, username: &str) -> Result<Account, ApplicationError> {
        self.accounts.get(username).await
    }

    pub async fn update_profile(
        &self,
        username: &str,
        changes: UserDTO,
    ) -> Result<Account, ApplicationError> {
        if changes.is_empty() {
            return Err(ApplicationError::BadRequest("Nothing to update".to_string()));
        }
        if let Some(name) = &changes.display_name {
            validate_display_name(name)?;
        }

        let account = self.accounts.update(username, changes).await?;
        self.accounts.persist().await?;

        Ok(account)
    }

    pub async fn owned_files(&self, username: &str) -> Result<Vec<FileRecord>, ApplicationError> {
        self.accounts.get(username).await?;
        let mut files = self.files.list_by_owner(username).await?;
        files.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        Ok(files)
    }
}
