use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;

use crate::{
    adapters::{
        dto::{file_dto::FileListResponse, user_dto::ProfileResponse, ApiResponse},
        middleware::{Caller, ClientIp},
        state::AppState,
    },
    application::{dto::user_dto::UserDTO, error::ApplicationError},
    domain::models::{identity::Identity, security::AccessRequest},
};

fn member(identity: &Identity) -> Result<&str, ApplicationError> {
    identity
        .owning_account()
        .ok_or_else(|| ApplicationError::Forbidden("Administrators have no profile".to_string()))
}

pub struct UserController;

impl UserController {
    /// GET /api/users/me
    pub async fn get_profile(
        State(app_state): State<AppState>,
        Caller(identity): Caller,
    ) -> Result<Json<ApiResponse<ProfileResponse>>, ApplicationError> {
        let account = app_state.account_service.profile(member(&identity)?).await?;
        Ok(Json(ApiResponse::data(ProfileResponse::from(account))))
    }

    /// PATCH /api/users/me
    pub async fn update_profile(
        State(app_state): State<AppState>,
        Caller(identity): Caller,
        Json(body): Json<UserDTO>,
    ) -> Result<Json<ApiResponse<ProfileResponse>>, ApplicationError> {
        let account = app_state
            .account_service
            .update_profile(member(&identity)?, body)
            .await?;
        Ok(Json(ApiResponse::with_message(
            "Profile updated",
            ProfileResponse::from(account),
        )))
    }

    /// GET /api/users/me/files
    pub async fn get_own_files(
        State(app_state): State<AppState>,
        Caller(identity): Caller,
    ) -> Result<Json<ApiResponse<FileListResponse>>, ApplicationError> {
        let files = app_state
            .account_service
            .owned_files(member(&identity)?)
            .await?;
        Ok(Json(ApiResponse::data(FileListResponse::from(files))))
    }

    /// POST /api/access-requests
    pub async fn request_access(
        State(app_state): State<AppState>,
        Caller(identity): Caller,
        ClientIp(ip): ClientIp,
    ) -> Result<(StatusCode, Json<ApiResponse<AccessRequest>>), ApplicationError> {
        if identity.is_owner() {
            return Err(ApplicationError::BadRequest(
                "The owner already has full access".to_string(),
            ));
        }

        let now = Utc::now();
        app_state.ip_blocks.ensure_allowed_at(&ip, now).await?;

        let request = app_state
            .access_ledger
            .create_access_request(identity.username(), &ip, now)
            .await?;

        Ok((
            StatusCode::CREATED,
            Json(ApiResponse::with_message("Access request submitted", request)),
        ))
    }
}
