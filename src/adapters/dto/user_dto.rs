use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::models::user::Account;

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub username: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
    #[serde(rename = "avatarRef")]
    pub avatar_ref: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "lastActivityAt")]
    pub last_activity_at: Option<DateTime<Utc>>,
    #[serde(rename = "fileCount")]
    pub file_count: usize,
}

impl From<Account> for ProfileResponse {
    fn from(account: Account) -> Self {
        Self {
            file_count: account.owned_file_codes.len(),
            username: account.username,
            display_name: account.display_name,
            avatar_ref: account.avatar_ref,
            created_at: account.created_at,
            last_activity_at: account.last_activity_at,
        }
    }
}
