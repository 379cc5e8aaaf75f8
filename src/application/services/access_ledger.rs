use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    application::{
        error::ApplicationError,
        services::{ip_block_list::IpBlockList, notification_ledger::NotificationLedger},
    },
    domain::models::{
        notification::NotificationKind,
        security::{AccessRequest, AccessRequestStatus, AdminLoginRequest, AdminLoginStatus},
    },
};

/// Handled access requests kept for the admin listing.
const MAX_HANDLED_ACCESS_REQUESTS: usize = 200;
/// Unanswered console logins expire after this many minutes.
const PENDING_LOGIN_TTL_MINUTES: i64 = 24 * 60;
/// Resolved console logins stay pollable for this many minutes.
const RESOLVED_LOGIN_TTL_MINUTES: i64 = 60;

#[derive(Default)]
struct AccessRequestBook {
    requests: Vec<AccessRequest>,
    /// Outlives pruned requests so repeat offenders still escalate.
    rejections_by_ip: HashMap<String, usize>,
}

impl AccessRequestBook {
    /// Drops the oldest handled requests beyond the retention cap.
    fn prune_handled(&mut self) {
        let handled = self
            .requests
            .iter()
            .filter(|r| r.status != AccessRequestStatus::Pending)
            .count();
        let mut excess = handled.saturating_sub(MAX_HANDLED_ACCESS_REQUESTS);
        self.requests.retain(|r| {
            if excess > 0 && r.status != AccessRequestStatus::Pending {
                excess -= 1;
                false
            } else {
                true
            }
        });
    }
}

fn login_is_live(request: &AdminLoginRequest, now: DateTime<Utc>) -> bool {
    match request.resolved_at {
        None => now - request.created_at < Duration::minutes(PENDING_LOGIN_TTL_MINUTES),
        Some(resolved_at) => {
            request.claimed_at.is_none()
                && now - resolved_at < Duration::minutes(RESOLVED_LOGIN_TTL_MINUTES)
        }
    }
}

/// Owner-moderated requests: console logins by non-owner admins and the
/// older elevated-access requests.
pub struct AccessLedger {
    ip_blocks: Arc<IpBlockList>,
    notifications: Arc<NotificationLedger>,
    admin_logins: RwLock<HashMap<String, AdminLoginRequest>>,
    access_requests: RwLock<AccessRequestBook>,
}

impl AccessLedger {
    pub fn new(ip_blocks: Arc<IpBlockList>, notifications: Arc<NotificationLedger>) -> Self {
        Self {
            ip_blocks,
            notifications,
            admin_logins: RwLock::new(HashMap::new()),
            access_requests: RwLock::new(AccessRequestBook::default()),
        }
    }

    pub async fn create_admin_login_request(
        &self,
        username: &str,
        source_ip: &str,
        now: DateTime<Utc>,
    ) -> AdminLoginRequest {
        let mut logins = self.admin_logins.write().await;
        logins.retain(|_, r| login_is_live(r, now));

        // Repeated submissions from the same address wait on one request
        if let Some(existing) = logins.values().find(|r| {
            r.status == AdminLoginStatus::Pending
                && r.username == username
                && r.source_ip == source_ip
        }) {
            return existing.clone();
        }

        let request = AdminLoginRequest {
            request_id: Uuid::new_v4().to_string(),
            username: username.to_string(),
            source_ip: source_ip.to_string(),
            created_at: now,
            status: AdminLoginStatus::Pending,
            resolved_at: None,
            claimed_at: None,
        };

        logins.insert(request.request_id.clone(), request.clone());
        drop(logins);

        info!("Admin login request created: {} from {}", username, source_ip);
        self.notifications
            .notify(
                NotificationKind::AdminLoginRequest,
                format!("Admin {} is requesting to login", username),
                json!({
                    "username": username,
                    "ip": source_ip,
                    "requestId": request.request_id,
                }),
            )
            .await;

        request
    }

    pub async fn admin_login_status(
        &self,
        request_id: &str,
    ) -> Result<AdminLoginRequest, ApplicationError> {
        self.admin_logins
            .read()
            .await
            .get(request_id)
            .cloned()
            .ok_or_else(|| ApplicationError::NotFound("Login request not found".to_string()))
    }

    pub async fn pending_admin_logins(&self) -> Vec<AdminLoginRequest> {
        let mut pending: Vec<AdminLoginRequest> = self
            .admin_logins
            .read()
            .await
            .values()
            .filter(|r| r.status == AdminLoginStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(|r| r.created_at);
        pending
    }

    async fn resolve_admin_login(
        &self,
        request_id: &str,
        status: AdminLoginStatus,
        now: DateTime<Utc>,
    ) -> Result<AdminLoginRequest, ApplicationError> {
        let mut logins = self.admin_logins.write().await;
        let request = logins
            .get_mut(request_id)
            .ok_or_else(|| ApplicationError::NotFound("Login request not found".to_string()))?;

        if request.status != AdminLoginStatus::Pending {
            return Err(ApplicationError::BadRequest(
                "Login request already resolved".to_string(),
            ));
        }

        request.status = status;
        request.resolved_at = Some(now);
        Ok(request.clone())
    }

    pub async fn approve_admin_login(
        &self,
        request_id: &str,
        now: DateTime<Utc>,
    ) -> Result<AdminLoginRequest, ApplicationError> {
        let request = self
            .resolve_admin_login(request_id, AdminLoginStatus::Approved, now)
            .await?;
        info!("Admin login approved: {}", request.username);
        Ok(request)
    }

    /// Denial always bans the request's source IP permanently.
    pub async fn deny_admin_login(
        &self,
        request_id: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<AdminLoginRequest, ApplicationError> {
        let request = self
            .resolve_admin_login(request_id, AdminLoginStatus::Denied, now)
            .await?;

        self.ip_blocks
            .block_at(&request.source_ip, reason, true, now)
            .await;
        warn!(
            "Admin login denied and IP banned: {} from {}",
            request.username, request.source_ip
        );

        Ok(request)
    }

    /// Hands an approved login to the poller exactly once, and only to the
    /// address that asked for it.
    pub async fn claim_approved_login(
        &self,
        request_id: &str,
        source_ip: &str,
        now: DateTime<Utc>,
    ) -> Result<AdminLoginRequest, ApplicationError> {
        let mut logins = self.admin_logins.write().await;
        let request = logins
            .get_mut(request_id)
            .ok_or_else(|| ApplicationError::NotFound("Login request not found".to_string()))?;

        if request.status != AdminLoginStatus::Approved {
            return Err(ApplicationError::BadRequest(
                "Login request is not approved".to_string(),
            ));
        }
        if request.source_ip != source_ip {
            return Err(ApplicationError::Forbidden(
                "Login request belongs to another address".to_string(),
            ));
        }
        if request.claimed_at.is_some() {
            return Err(ApplicationError::Forbidden(
                "Login request already used".to_string(),
            ));
        }

        request.claimed_at = Some(now);
        Ok(request.clone())
    }

    pub async fn create_access_request(
        &self,
        username: &str,
        source_ip: &str,
        now: DateTime<Utc>,
    ) -> Result<AccessRequest, ApplicationError> {
        let mut book = self.access_requests.write().await;
        if book
            .requests
            .iter()
            .any(|r| r.username == username && r.status == AccessRequestStatus::Pending)
        {
            return Err(ApplicationError::AlreadyExists(
                "An access request is already pending".to_string(),
            ));
        }

        let request = AccessRequest {
            id: Uuid::new_v4().to_string(),
            username: username.to_string(),
            source_ip: source_ip.to_string(),
            requested_at: now,
            status: AccessRequestStatus::Pending,
            handled_by: None,
            handled_at: None,
        };

        book.requests.push(request.clone());
        drop(book);

        self.notifications
            .notify(
                NotificationKind::AccessRequest,
                format!("User {} requesting admin access", username),
                json!(request),
            )
            .await;

        Ok(request)
    }

    pub async fn access_requests(&self) -> Vec<AccessRequest> {
        self.access_requests.read().await.requests.clone()
    }

    /// A rejection blocks the source IP: temporarily the first time,
    /// permanently once an earlier rejection from that IP exists.
    pub async fn handle_access_request(
        &self,
        request_id: &str,
        approved: bool,
        handled_by: &str,
        now: DateTime<Utc>,
    ) -> Result<AccessRequest, ApplicationError> {
        let (request, prior_rejections) = {
            let mut book = self.access_requests.write().await;

            let request = book
                .requests
                .iter_mut()
                .find(|r| r.id == request_id)
                .ok_or_else(|| ApplicationError::NotFound("Access request not found".to_string()))?;

            if request.status != AccessRequestStatus::Pending {
                return Err(ApplicationError::BadRequest(
                    "Access request already handled".to_string(),
                ));
            }

            request.status = if approved {
                AccessRequestStatus::Approved
            } else {
                AccessRequestStatus::Rejected
            };
            request.handled_by = Some(handled_by.to_string());
            request.handled_at = Some(now);
            let request = request.clone();

            let prior_rejections = if approved {
                0
            } else {
                let count = book
                    .rejections_by_ip
                    .entry(request.source_ip.clone())
                    .or_default();
                *count += 1;
                *count - 1
            };
            book.prune_handled();

            (request, prior_rejections)
        };

        if !approved {
            if prior_rejections >= 1 {
                self.ip_blocks
                    .block_at(&request.source_ip, "Multiple admin access rejections", true, now)
                    .await;
            } else {
                self.ip_blocks
                    .block_at(&request.source_ip, "Admin access rejected", false, now)
                    .await;
            }
        }

        info!(
            "Access request {} for {} {} by {}",
            request.id,
            request.username,
            if approved { "approved" } else { "rejected" },
            handled_by
        );

        Ok(request)
    }
}
