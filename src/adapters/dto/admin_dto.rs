use serde::{Deserialize, Serialize};

use crate::{
    application::services::capacity_gate::StorageStatus,
    domain::models::security::IpBlockState,
};

#[derive(Debug, Deserialize)]
pub struct HandleAccessRequest {
    pub approved: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct DenyLoginRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BlockedIpResponse {
    pub ip: String,
    #[serde(flatten)]
    pub block: IpBlockState,
}

#[derive(Debug, Serialize)]
pub struct StorageStatusResponse {
    #[serde(flatten)]
    pub status: StorageStatus,
    #[serde(rename = "fileCount")]
    pub file_count: usize,
}

#[derive(Debug, Serialize)]
pub struct UnlockResponse {
    pub released: bool,
}
