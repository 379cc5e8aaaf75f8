use std::sync::Arc;

use crate::{
    application::{
        error::ApplicationError, repositories::account_repository::AccountRepository,
        services::password::verify_password,
    },
    domain::models::identity::{AdminRoster, Identity},
};

/// Resolves a username/password pair against the administrator roster first,
/// then against registered accounts.
pub struct Authenticator {
    roster: AdminRoster,
    accounts: Arc<dyn AccountRepository>,
}

impl Authenticator {
    pub fn new(roster: AdminRoster, accounts: Arc<dyn AccountRepository>) -> Self {
        Self { roster, accounts }
    }

    pub fn roster(&self) -> &AdminRoster {
        &self.roster
    }

    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Identity, ApplicationError> {
        // A roster name never falls through to the account table.
        if let Some(admin) = self.roster.find(username) {
            if admin.credential_secret != password {
                return Err(ApplicationError::InvalidCredentials {
                    remaining_attempts: None,
                });
            }
            return Ok(Identity::Administrator {
                username: admin.username.clone(),
                role: admin.role,
            });
        }

        let account = self.accounts.get(username).await?;
        if !verify_password(password, &account.credential_secret)? {
            return Err(ApplicationError::InvalidCredentials {
                remaining_attempts: None,
            });
        }

        Ok(Identity::Member {
            username: account.username,
        })
    }
}
