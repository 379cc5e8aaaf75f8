use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use reqwest::{multipart, Client, Response, StatusCode};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::{
    application::{
        error::ApplicationError,
        services::{document_store::DocumentStore, storage_service::StorageService},
    },
    domain::{
        config::secrets::CloudinarySecrets,
        models::file::{sanitize_filename, FileData, StorageLocator},
    },
    services::error::StorageError,
};

const API_BASE: &str = "https://api.cloudinary.com/v1_1";
const FOLDER: &str = "space-file-transfer";
const DOCUMENT_FOLDER: &str = "space-file-transfer/db";

#[derive(Debug, Deserialize)]
struct UploadResponse {
    public_id: String,
    resource_type: String,
    secure_url: String,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

#[derive(Debug, Deserialize)]
struct UsageResponse {
    storage: StorageUsage,
}

#[derive(Debug, Deserialize)]
struct StorageUsage {
    usage: u64,
}

#[derive(Debug, Deserialize)]
struct ResourceResponse {
    secure_url: String,
}

pub struct CloudinaryStorageService {
    client: Client,
    cloud_name: String,
    api_key: String,
    api_secret: String,
}

impl CloudinaryStorageService {
    pub fn new(secrets: CloudinarySecrets) -> Self {
        Self {
            client: Client::new(),
            cloud_name: secrets.cloud_name,
            api_key: secrets.api_key,
            api_secret: secrets.api_secret,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}/{}", API_BASE, self.cloud_name, path)
    }

    /// SHA-256 over the alphabetically sorted parameters followed by the secret.
    fn sign(&self, params: &BTreeMap<&str, String>) -> String {
        let to_sign = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");

        let mut hasher = Sha256::new();
        hasher.update(to_sign.as_bytes());
        hasher.update(self.api_secret.as_bytes());
        hex::encode(hasher.finalize())
    }

    fn signed_form(&self, params: BTreeMap<&str, String>) -> multipart::Form {
        let signature = self.sign(&params);
        let mut form = multipart::Form::new();
        for (key, value) in params {
            form = form.text(key.to_string(), value);
        }
        form.text("api_key", self.api_key.clone())
            .text("signature", signature)
            .text("signature_algorithm", "sha256")
    }

    fn generate_public_id(filename: &str) -> String {
        let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000_000);
        format!(
            "{}-{}-{}",
            Utc::now().timestamp_millis(),
            suffix,
            sanitize_filename(filename)
        )
    }

    async fn check(response: Response, action: &str) -> Result<Response, StorageError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(match status {
            StatusCode::NOT_FOUND => StorageError::NotFound(body),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StorageError::Unauthorized(body),
            _ => StorageError::ProviderError(format!("{} failed ({}): {}", action, status, body)),
        })
    }

    async fn upload_form(
        &self,
        resource_type: &str,
        form: multipart::Form,
    ) -> Result<UploadResponse, StorageError> {
        let response = self
            .client
            .post(self.endpoint(&format!("{}/upload", resource_type)))
            .multipart(form)
            .send()
            .await?;

        Ok(Self::check(response, "Upload").await?.json().await?)
    }
}

#[async_trait]
impl StorageService for CloudinaryStorageService {
    async fn upload(&self, file_data: FileData) -> Result<StorageLocator, ApplicationError> {
        let mut params = BTreeMap::new();
        params.insert("folder", FOLDER.to_string());
        params.insert("public_id", Self::generate_public_id(&file_data.filename));
        params.insert("timestamp", Utc::now().timestamp().to_string());

        let file_part = multipart::Part::bytes(file_data.content)
            .file_name(file_data.filename)
            .mime_str(&file_data.mime_type)
            .map_err(|e| StorageError::InternalError(e.to_string()))?;

        let form = self.signed_form(params).part("file", file_part);
        let uploaded = self.upload_form("auto", form).await?;

        Ok(StorageLocator {
            provider: "cloudinary".to_string(),
            public_id: uploaded.public_id,
            resource_type: uploaded.resource_type,
            url: Some(uploaded.secure_url),
        })
    }

    async fn download(&self, locator: &StorageLocator) -> Result<Vec<u8>, ApplicationError> {
        let url = locator.url.as_ref().ok_or_else(|| {
            StorageError::InternalError(format!("No delivery URL for {}", locator.public_id))
        })?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(StorageError::from)?;
        let bytes = Self::check(response, "Download")
            .await?
            .bytes()
            .await
            .map_err(|e| StorageError::NetworkError(e.to_string()))?;

        Ok(bytes.to_vec())
    }

    async fn delete(&self, locator: &StorageLocator) -> Result<(), ApplicationError> {
        let mut params = BTreeMap::new();
        params.insert("public_id", locator.public_id.clone());
        params.insert("invalidate", "true".to_string());
        params.insert("timestamp", Utc::now().timestamp().to_string());

        let response = self
            .client
            .post(self.endpoint(&format!("{}/destroy", locator.resource_type)))
            .multipart(self.signed_form(params))
            .send()
            .await
            .map_err(StorageError::from)?;

        let destroyed: DestroyResponse = Self::check(response, "Delete")
            .await?
            .json()
            .await
            .map_err(StorageError::from)?;

        match destroyed.result.as_str() {
            "ok" => Ok(()),
            "not found" => Err(StorageError::NotFound(locator.public_id.clone()).into()),
            other => Err(StorageError::ProviderError(format!("Delete returned {}", other)).into()),
        }
    }

    async fn usage(&self) -> Result<u64, ApplicationError> {
        let response = self
            .client
            .get(self.endpoint("usage"))
            .basic_auth(&self.api_key, Some(&self.api_secret))
            .send()
            .await
            .map_err(StorageError::from)?;

        let usage: UsageResponse = Self::check(response, "Usage query")
            .await?
            .json()
            .await
            .map_err(StorageError::from)?;

        Ok(usage.storage.usage)
    }
}

/// JSON documents live as `raw` resources with a fixed public id, overwritten in place.
#[async_trait]
impl DocumentStore for CloudinaryStorageService {
    async fn load(&self, name: &str) -> Result<Option<Vec<u8>>, ApplicationError> {
        let public_id = format!("{}/{}", DOCUMENT_FOLDER, name);

        let response = self
            .client
            .get(self.endpoint(&format!("resources/raw/upload/{}", public_id)))
            .basic_auth(&self.api_key, Some(&self.api_secret))
            .send()
            .await
            .map_err(StorageError::from)?;

        if response.status() == StatusCode::NOT_FOUND {
            info!("No stored {} yet, starting empty", name);
            return Ok(None);
        }

        let resource: ResourceResponse = Self::check(response, "Document lookup")
            .await?
            .json()
            .await
            .map_err(StorageError::from)?;

        // Skip the CDN cache, a stale copy would roll state back.
        let url = format!("{}?t={}", resource.secure_url, Utc::now().timestamp_millis());
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(StorageError::from)?;
        let bytes = Self::check(response, "Document download")
            .await?
            .bytes()
            .await
            .map_err(|e| StorageError::NetworkError(e.to_string()))?;

        Ok(Some(bytes.to_vec()))
    }

    async fn save(&self, name: &str, content: Vec<u8>) -> Result<(), ApplicationError> {
        let mut params = BTreeMap::new();
        params.insert("public_id", format!("{}/{}", DOCUMENT_FOLDER, name));
        params.insert("overwrite", "true".to_string());
        params.insert("invalidate", "true".to_string());
        params.insert("timestamp", Utc::now().timestamp().to_string());

        let file_part = multipart::Part::bytes(content)
            .file_name(name.to_string())
            .mime_str("application/json")
            .map_err(|e| StorageError::InternalError(e.to_string()))?;

        let form = self.signed_form(params).part("file", file_part);
        self.upload_form("raw", form).await.map_err(|e| {
            warn!("Failed to save {}: {}", name, e);
            ApplicationError::PersistenceError(format!("Cannot save {}: {}", name, e))
        })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> CloudinaryStorageService {
        CloudinaryStorageService::new(CloudinarySecrets {
            cloud_name: "demo".into(),
            api_key: "1234".into(),
            api_secret: "abcd".into(),
        })
    }

    #[test]
    fn signature_covers_sorted_params_and_secret() {
        let service = service();
        let mut params = BTreeMap::new();
        params.insert("timestamp", "1315060510".to_string());
        params.insert("public_id", "sample".to_string());

        let mut hasher = Sha256::new();
        hasher.update(b"public_id=sample&timestamp=1315060510abcd");
        assert_eq!(service.sign(&params), hex::encode(hasher.finalize()));
    }

    #[test]
    fn public_ids_keep_a_safe_filename_suffix() {
        let id = CloudinaryStorageService::generate_public_id("my report.pdf");
        assert!(id.ends_with("-my_report.pdf"));
        assert!(!id.contains(' '));
    }

    #[test]
    fn endpoints_are_scoped_to_cloud() {
        assert_eq!(
            service().endpoint("usage"),
            "https://api.cloudinary.com/v1_1/demo/usage"
        );
    }
}
