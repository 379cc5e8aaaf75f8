use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::{optional, parsed_or, ConfigError};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Provider {
    #[serde(rename = "cloudinary")]
    Cloudinary,
    #[serde(rename = "local")]
    Local,
}

impl Provider {
    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "cloudinary" => Ok(Provider::Cloudinary),
            "local" => Ok(Provider::Local),
            _ => Err(ConfigError::Invalid {
                key: "STORAGE_PROVIDER",
                value: value.to_string(),
            }),
        }
    }
}

/// Process-level settings: where to listen and which storage backend to use.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub provider: Provider,
    pub local_storage_dir: PathBuf,
    pub public_base_url: String,
    pub cors_allowed_origins: Option<Vec<String>>,
    /// Set only behind a reverse proxy that appends the peer address to
    /// `X-Forwarded-For`. Otherwise the header is client-controlled.
    pub trust_proxy: bool,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = parsed_or("PORT", 3000u16)?;

        let provider = match optional("STORAGE_PROVIDER") {
            Some(value) => Provider::parse(&value)?,
            None => Provider::Cloudinary,
        };

        let local_storage_dir =
            PathBuf::from(optional("LOCAL_STORAGE_DIR").unwrap_or_else(|| "./uploads".to_string()));

        let public_base_url = optional("PUBLIC_BASE_URL")
            .unwrap_or_else(|| format!("http://localhost:{}", port))
            .trim_end_matches('/')
            .to_string();

        let cors_allowed_origins = optional("CORS_ALLOWED_ORIGINS").map(|origins| {
            origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        });

        Ok(Self {
            port,
            provider,
            local_storage_dir,
            public_base_url,
            cors_allowed_origins,
            trust_proxy: parsed_or("TRUST_PROXY", false)?,
        })
    }

    pub fn share_link(&self, code: &str) -> String {
        format!("{}/?code={}", self.public_base_url, code)
    }
}
