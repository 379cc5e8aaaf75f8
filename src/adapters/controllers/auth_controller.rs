use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use tracing::info;

use crate::{
    adapters::{
        dto::{
            auth_dto::{
                AdminLoginPollResponse, LoginRequest, LoginResponse, PendingLoginResponse,
                SessionResponse, SignupRequest,
            },
            ApiResponse,
        },
        middleware::ClientIp,
        session::SessionService,
        state::AppState,
    },
    application::{error::ApplicationError, services::login_service::LoginOutcome},
    domain::models::{
        identity::{AdminRole, Identity},
        security::AdminLoginStatus,
    },
};

fn session_for(
    sessions: &SessionService,
    identity: &Identity,
) -> Result<SessionResponse, ApplicationError> {
    Ok(SessionResponse {
        token: sessions.issue(identity)?,
        username: identity.username().to_string(),
        role: identity.role(),
    })
}

pub struct AuthController;

impl AuthController {
    /// POST /api/auth/signup
    pub async fn signup(
        State(app_state): State<AppState>,
        ClientIp(ip): ClientIp,
        Json(body): Json<SignupRequest>,
    ) -> Result<(StatusCode, Json<ApiResponse<SessionResponse>>), ApplicationError> {
        app_state.ip_blocks.ensure_allowed_at(&ip, Utc::now()).await?;

        let account = app_state
            .account_service
            .signup(&body.username, &body.password, body.display_name)
            .await?;

        let identity = Identity::Member {
            username: account.username,
        };
        let session = session_for(&app_state.sessions, &identity)?;

        Ok((
            StatusCode::CREATED,
            Json(ApiResponse::with_message("Account created", session)),
        ))
    }

    /// POST /api/auth/login
    /// Non-owner administrators get `202 Accepted` with a request id to poll.
    pub async fn login(
        State(app_state): State<AppState>,
        ClientIp(ip): ClientIp,
        Json(body): Json<LoginRequest>,
    ) -> Result<(StatusCode, Json<ApiResponse<LoginResponse>>), ApplicationError> {
        let outcome = app_state
            .login_service
            .login(&body.username, &body.password, &ip)
            .await?;

        match outcome {
            LoginOutcome::Granted(identity) => {
                let session = session_for(&app_state.sessions, &identity)?;
                Ok((
                    StatusCode::OK,
                    Json(ApiResponse::with_message(
                        "Login successful",
                        LoginResponse::Session(session),
                    )),
                ))
            }
            LoginOutcome::PendingApproval(request) => Ok((
                StatusCode::ACCEPTED,
                Json(ApiResponse::with_message(
                    "Waiting for owner approval",
                    LoginResponse::Pending(PendingLoginResponse::from(request)),
                )),
            )),
        }
    }

    /// GET /api/auth/admin-login/{request_id}
    /// Hands out the session once, to the address that created the request.
    pub async fn poll_admin_login(
        State(app_state): State<AppState>,
        ClientIp(ip): ClientIp,
        Path(request_id): Path<String>,
    ) -> Result<Json<ApiResponse<AdminLoginPollResponse>>, ApplicationError> {
        let request = app_state
            .access_ledger
            .admin_login_status(&request_id)
            .await?;

        let session = match request.status {
            AdminLoginStatus::Approved => {
                let request = app_state
                    .access_ledger
                    .claim_approved_login(&request_id, &ip, Utc::now())
                    .await?;
                info!("Approved admin login claimed by {}", request.username);

                let identity = Identity::Administrator {
                    username: request.username,
                    role: AdminRole::Admin,
                };
                Some(session_for(&app_state.sessions, &identity)?)
            }
            AdminLoginStatus::Pending | AdminLoginStatus::Denied => None,
        };

        Ok(Json(ApiResponse::data(AdminLoginPollResponse {
            status: request.status,
            session,
        })))
    }
}
