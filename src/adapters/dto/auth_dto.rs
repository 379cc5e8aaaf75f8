use serde::{Deserialize, Serialize};

use crate::domain::models::{
    identity::Role,
    security::{AdminLoginRequest, AdminLoginStatus},
};

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub password: String,
    #[serde(rename = "displayName")]
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub username: String,
    pub role: Role,
}

#[derive(Debug, Serialize)]
pub struct PendingLoginResponse {
    #[serde(rename = "requestId")]
    pub request_id: String,
    pub status: AdminLoginStatus,
    #[serde(rename = "requiresApproval")]
    pub requires_approval: bool,
}

impl From<AdminLoginRequest> for PendingLoginResponse {
    fn from(request: AdminLoginRequest) -> Self {
        Self {
            request_id: request.request_id,
            status: request.status,
            requires_approval: true,
        }
    }
}

/// Either a session or a pending approval, tagged by which fields are present.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum LoginResponse {
    Session(SessionResponse),
    Pending(PendingLoginResponse),
}

#[derive(Debug, Serialize)]
pub struct AdminLoginPollResponse {
    pub status: AdminLoginStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionResponse>,
}
