use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdminRole {
    Owner,
    Admin,
}

/// Role carried by an authenticated session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Admin,
    User,
}

impl Role {
    pub fn is_admin(self) -> bool {
        matches!(self, Role::Owner | Role::Admin)
    }
}

impl From<AdminRole> for Role {
    fn from(role: AdminRole) -> Self {
        match role {
            AdminRole::Owner => Role::Owner,
            AdminRole::Admin => Role::Admin,
        }
    }
}

#[derive(Clone)]
pub struct AdministratorIdentity {
    pub username: String,
    pub credential_secret: String,
    pub role: AdminRole,
}

impl AdministratorIdentity {
    pub fn new(username: String, credential_secret: String, role: AdminRole) -> Self {
        Self {
            username,
            credential_secret,
            role,
        }
    }
}

impl fmt::Debug for AdministratorIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdministratorIdentity")
            .field("username", &self.username)
            .field("credential_secret", &"<redacted>")
            .field("role", &self.role)
            .finish()
    }
}

/// The fixed administrator roster. Always holds exactly one owner.
#[derive(Debug, Clone)]
pub struct AdminRoster {
    entries: Vec<AdministratorIdentity>,
}

impl AdminRoster {
    pub fn new(entries: Vec<AdministratorIdentity>) -> Result<Self, String> {
        let owners = entries.iter().filter(|a| a.role == AdminRole::Owner).count();
        if owners != 1 {
            return Err(format!("roster must contain exactly one owner, found {}", owners));
        }

        for (i, admin) in entries.iter().enumerate() {
            if entries[..i].iter().any(|other| other.username == admin.username) {
                return Err(format!("duplicate administrator username '{}'", admin.username));
            }
        }

        Ok(Self { entries })
    }

    pub fn find(&self, username: &str) -> Option<&AdministratorIdentity> {
        self.entries.iter().find(|a| a.username == username)
    }

    pub fn contains(&self, username: &str) -> bool {
        self.find(username).is_some()
    }

    pub fn is_owner(&self, username: &str) -> bool {
        self.find(username)
            .map(|a| a.role == AdminRole::Owner)
            .unwrap_or(false)
    }
}

/// Who a successful authentication resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Administrator { username: String, role: AdminRole },
    Member { username: String },
}

impl Identity {
    pub fn username(&self) -> &str {
        match self {
            Identity::Administrator { username, .. } | Identity::Member { username } => username,
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Identity::Administrator { role, .. } => (*role).into(),
            Identity::Member { .. } => Role::User,
        }
    }

    pub fn is_owner(&self) -> bool {
        self.role() == Role::Owner
    }

    /// Account that owns uploads made by this identity. Administrators have none.
    pub fn owning_account(&self) -> Option<&str> {
        match self {
            Identity::Administrator { .. } => None,
            Identity::Member { username } => Some(username),
        }
    }
}
