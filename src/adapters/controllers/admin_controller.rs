use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use tracing::info;

use crate::{
    adapters::{
        dto::{
            admin_dto::{BlockedIpResponse, DenyLoginRequest, HandleAccessRequest, UnlockResponse},
            ApiResponse,
        },
        middleware::Caller,
        state::AppState,
    },
    application::error::ApplicationError,
    domain::models::{
        identity::Identity,
        notification::Notification,
        security::{AccessRequest, AdminLoginRequest},
    },
};

const DEFAULT_DENY_REASON: &str = "Unauthorized access attempt";

fn require_owner(identity: &Identity) -> Result<(), ApplicationError> {
    if identity.is_owner() {
        Ok(())
    } else {
        Err(ApplicationError::Forbidden(
            "Only the owner can do this".to_string(),
        ))
    }
}

/// Routes mounted behind `require_admin`; owner-only actions check again here.
pub struct AdminController;

impl AdminController {
    /// GET /api/admin/notifications
    pub async fn notifications(
        State(app_state): State<AppState>,
    ) -> Json<ApiResponse<Vec<Notification>>> {
        Json(ApiResponse::data(app_state.notifications.list().await))
    }

    /// GET /api/admin/login-requests
    pub async fn pending_logins(
        State(app_state): State<AppState>,
    ) -> Json<ApiResponse<Vec<AdminLoginRequest>>> {
        Json(ApiResponse::data(
            app_state.access_ledger.pending_admin_logins().await,
        ))
    }

    /// POST /api/admin/login-requests/{id}/approve
    pub async fn approve_login(
        State(app_state): State<AppState>,
        Caller(identity): Caller,
        Path(request_id): Path<String>,
    ) -> Result<Json<ApiResponse<AdminLoginRequest>>, ApplicationError> {
        require_owner(&identity)?;
        let request = app_state
            .access_ledger
            .approve_admin_login(&request_id, Utc::now())
            .await?;
        Ok(Json(ApiResponse::with_message("Login approved", request)))
    }

    /// POST /api/admin/login-requests/{id}/deny?reason=...
    pub async fn deny_login(
        State(app_state): State<AppState>,
        Caller(identity): Caller,
        Path(request_id): Path<String>,
        Query(query): Query<DenyLoginRequest>,
    ) -> Result<Json<ApiResponse<AdminLoginRequest>>, ApplicationError> {
        require_owner(&identity)?;
        let reason = query
            .reason
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DENY_REASON.to_string());

        let request = app_state
            .access_ledger
            .deny_admin_login(&request_id, &reason, Utc::now())
            .await?;
        Ok(Json(ApiResponse::with_message(
            "Login denied and IP banned",
            request,
        )))
    }

    /// GET /api/admin/access-requests
    pub async fn access_requests(
        State(app_state): State<AppState>,
    ) -> Json<ApiResponse<Vec<AccessRequest>>> {
        Json(ApiResponse::data(app_state.access_ledger.access_requests().await))
    }

    /// POST /api/admin/access-requests/{id}
    pub async fn handle_access_request(
        State(app_state): State<AppState>,
        Caller(identity): Caller,
        Path(request_id): Path<String>,
        Json(body): Json<HandleAccessRequest>,
    ) -> Result<Json<ApiResponse<AccessRequest>>, ApplicationError> {
        require_owner(&identity)?;
        let request = app_state
            .access_ledger
            .handle_access_request(&request_id, body.approved, identity.username(), Utc::now())
            .await?;

        let message = if body.approved {
            "Access request approved"
        } else {
            "Access request rejected"
        };
        Ok(Json(ApiResponse::with_message(message, request)))
    }

    /// GET /api/admin/blocked-ips
    pub async fn blocked_ips(
        State(app_state): State<AppState>,
    ) -> Json<ApiResponse<Vec<BlockedIpResponse>>> {
        let now = Utc::now();
        let mut blocks: Vec<BlockedIpResponse> = app_state
            .ip_blocks
            .list()
            .await
            .into_iter()
            .filter(|(_, block)| block.is_active_at(now))
            .map(|(ip, block)| BlockedIpResponse { ip, block })
            .collect();
        blocks.sort_by(|a, b| b.block.blocked_at.cmp(&a.block.blocked_at));

        Json(ApiResponse::data(blocks))
    }

    /// POST /api/admin/storage/unlock
    pub async fn unlock_storage(
        State(app_state): State<AppState>,
        Caller(identity): Caller,
    ) -> Result<Json<ApiResponse<UnlockResponse>>, ApplicationError> {
        require_owner(&identity)?;
        let released = app_state
            .file_lifecycle
            .gate()
            .unlock_manually(identity.username())
            .await;

        info!(
            "Manual unlock by {}: {}",
            identity.username(),
            if released { "released" } else { "was not locked" }
        );

        let message = if released {
            "Uploads unlocked"
        } else {
            "Uploads were not locked"
        };
        Ok(Json(ApiResponse::with_message(
            message,
            UnlockResponse { released },
        )))
    }
}
