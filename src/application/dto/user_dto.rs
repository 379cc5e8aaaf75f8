use serde::{Deserialize, Serialize};

use crate::domain::models::user::Account;

/// Partial profile update. `None` leaves a field untouched.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDTO {
    pub display_name: Option<String>,
    /// `Some(None)` clears the avatar.
    #[serde(default, with = "double_option")]
    pub avatar_ref: Option<Option<String>>,
}

impl UserDTO {
    pub fn is_empty(&self) -> bool {
        self.display_name.is_none() && self.avatar_ref.is_none()
    }

    pub fn apply(self, account: &mut Account) {
        if let Some(display_name) = self.display_name {
            account.display_name = display_name;
        }
        if let Some(avatar_ref) = self.avatar_ref {
            account.avatar_ref = avatar_ref;
        }
    }
}

mod double_option {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(value: &Option<Option<String>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(inner) => inner.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<String>::deserialize(deserializer).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn missing_avatar_field_leaves_it_untouched() {
        let dto: UserDTO = serde_json::from_str(r#"{"displayName":"Bobby"}"#).unwrap();
        let mut account = Account::new("bob".into(), "h".into(), "Bob".into(), Utc::now());
        account.avatar_ref = Some("avatars/bob.png".into());

        dto.apply(&mut account);
        assert_eq!(account.display_name, "Bobby");
        assert_eq!(account.avatar_ref.as_deref(), Some("avatars/bob.png"));
    }

    #[test]
    fn explicit_null_clears_avatar() {
        let dto: UserDTO = serde_json::from_str(r#"{"avatarRef":null}"#).unwrap();
        assert!(!dto.is_empty());
        let mut account = Account::new("bob".into(), "h".into(), "Bob".into(), Utc::now());
        account.avatar_ref = Some("avatars/bob.png".into());

        dto.apply(&mut account);
        assert_eq!(account.avatar_ref, None);
        assert_eq!(account.display_name, "Bob");
    }
}
