use std::fmt;

use super::{optional, required, ConfigError};
use crate::domain::models::identity::{AdminRole, AdministratorIdentity};

#[derive(Clone)]
pub struct CloudinarySecrets {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

impl fmt::Debug for CloudinarySecrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudinarySecrets")
            .field("cloud_name", &self.cloud_name)
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Clone)]
pub struct Secrets {
    pub session_secret: String,
    pub cloudinary: Option<CloudinarySecrets>,
    pub administrators: Vec<AdministratorIdentity>,
}

impl Secrets {
    pub fn from_env() -> Result<Self, ConfigError> {
        let session_secret = required("SESSION_SECRET")?;

        let cloudinary = match optional("CLOUDINARY_CLOUD_NAME") {
            Some(cloud_name) => Some(CloudinarySecrets {
                cloud_name,
                api_key: required("CLOUDINARY_API_KEY")?,
                api_secret: required("CLOUDINARY_API_SECRET")?,
            }),
            None => None,
        };

        let mut administrators = vec![AdministratorIdentity::new(
            optional("OWNER_USERNAME").unwrap_or_else(|| "owner".to_string()),
            required("OWNER_PASSWORD")?,
            AdminRole::Owner,
        )];

        for (user_key, pass_key) in [
            ("ADMIN1_USERNAME", "ADMIN1_PASSWORD"),
            ("ADMIN2_USERNAME", "ADMIN2_PASSWORD"),
            ("ADMIN3_USERNAME", "ADMIN3_PASSWORD"),
        ] {
            // An admin slot without a password stays disabled.
            if let (Some(username), Some(password)) = (optional(user_key), optional(pass_key)) {
                administrators.push(AdministratorIdentity::new(
                    username,
                    password,
                    AdminRole::Admin,
                ));
            }
        }

        Ok(Self {
            session_secret,
            cloudinary,
            administrators,
        })
    }
}
