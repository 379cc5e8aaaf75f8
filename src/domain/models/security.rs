use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginAttemptState {
    pub failure_count: u32,
    pub lock_until: Option<DateTime<Utc>>,
    pub lock_escalation_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpBlockState {
    pub reason: String,
    pub blocked_at: DateTime<Utc>,
    pub permanent: bool,
    pub blocked_until: Option<DateTime<Utc>>,
}

impl IpBlockState {
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.permanent || self.blocked_until.map(|until| now < until).unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdminLoginStatus {
    Pending,
    Approved,
    Denied,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminLoginRequest {
    pub request_id: String,
    pub username: String,
    #[serde(rename = "ip")]
    pub source_ip: String,
    pub created_at: DateTime<Utc>,
    pub status: AdminLoginStatus,
    pub resolved_at: Option<DateTime<Utc>>,
    /// Set once the approved session has been handed out to the poller.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claimed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessRequestStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessRequest {
    pub id: String,
    pub username: String,
    #[serde(rename = "ip")]
    pub source_ip: String,
    pub requested_at: DateTime<Utc>,
    pub status: AccessRequestStatus,
    pub handled_by: Option<String>,
    pub handled_at: Option<DateTime<Utc>>,
}
