use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    application::error::ApplicationError,
    domain::models::identity::{AdminRole, Identity, Role},
};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn identity(&self) -> Identity {
        match self.role {
            Role::Owner => Identity::Administrator {
                username: self.sub.clone(),
                role: AdminRole::Owner,
            },
            Role::Admin => Identity::Administrator {
                username: self.sub.clone(),
                role: AdminRole::Admin,
            },
            Role::User => Identity::Member {
                username: self.sub.clone(),
            },
        }
    }
}

/// Issues and verifies HS256 bearer tokens.
pub struct SessionService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl SessionService {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    pub fn issue(&self, identity: &Identity) -> Result<String, ApplicationError> {
        let now = Utc::now();
        let claims = Claims {
            sub: identity.username().to_string(),
            role: identity.role(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| ApplicationError::InternalError(format!("Failed to issue token: {}", e)))
    }

    pub fn verify(&self, token: &str) -> Result<Identity, ApplicationError> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims.identity())
            .map_err(|e| {
                warn!("Rejected session token: {}", e);
                ApplicationError::Unauthorized
            })
    }
}
