use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationKind {
    #[serde(rename = "critical")]
    Critical,
    #[serde(rename = "warning")]
    Warning,
    #[serde(rename = "info")]
    Info,
    #[serde(rename = "ADMIN_LOGIN_REQUEST")]
    AdminLoginRequest,
    #[serde(rename = "ACCESS_REQUEST")]
    AccessRequest,
    #[serde(rename = "IP_BLOCKED")]
    IpBlocked,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub message: String,
    pub details: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    pub fn new(kind: NotificationKind, message: impl Into<String>, details: serde_json::Value) -> Self {
        Self {
            kind,
            message: message.into(),
            details,
            timestamp: Utc::now(),
        }
    }
}
