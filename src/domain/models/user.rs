use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A registered, non-administrator user.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub username: String,
    pub credential_secret: String,
    pub display_name: String,
    #[serde(default)]
    pub avatar_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_activity_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub owned_file_codes: BTreeSet<String>,
}

impl Account {
    pub fn new(
        username: String,
        credential_secret: String,
        display_name: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            username,
            credential_secret,
            display_name,
            avatar_ref: None,
            created_at: now,
            last_activity_at: Some(now),
            owned_file_codes: BTreeSet::new(),
        }
    }

    pub fn inactive_for(&self, now: DateTime<Utc>) -> Duration {
        now - self.last_activity_at.unwrap_or(self.created_at)
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("username", &self.username)
            .field("credential_secret", &"<redacted>")
            .field("display_name", &self.display_name)
            .field("avatar_ref", &self.avatar_ref)
            .field("created_at", &self.created_at)
            .field("last_activity_at", &self.last_activity_at)
            .field("owned_file_codes", &self.owned_file_codes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inactivity_falls_back_to_creation_time() {
        let created = Utc::now() - Duration::days(40);
        let mut account = Account::new("bob".into(), "hash".into(), "Bob".into(), created);
        account.last_activity_at = None;
        assert_eq!(account.inactive_for(created + Duration::days(40)), Duration::days(40));

        account.last_activity_at = Some(created + Duration::days(35));
        assert_eq!(account.inactive_for(created + Duration::days(40)), Duration::days(5));
    }

    #[test]
    fn debug_output_hides_credentials() {
        let account = Account::new("bob".into(), "$argon2id$secret".into(), "Bob".into(), Utc::now());
        let rendered = format!("{:?}", account);
        assert!(!rendered.contains("argon2id"));
        assert!(rendered.contains("<redacted>"));
    }
}
