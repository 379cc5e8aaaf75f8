use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Map, Value};
use tracing::{error, warn};

use crate::application::error::ApplicationError;

impl ApplicationError {
    /// Machine-readable code carried in the `error` field of the envelope.
    pub fn code(&self) -> &'static str {
        match self {
            ApplicationError::NotFound(_) => "NOT_FOUND",
            ApplicationError::Forbidden(_) => "FORBIDDEN",
            ApplicationError::InvalidCredentials { .. } => "INVALID_CREDENTIALS",
            ApplicationError::UserNotFound => "USER_NOT_FOUND",
            ApplicationError::AccountLocked { .. } => "ACCOUNT_LOCKED",
            ApplicationError::IpBlocked => "IP_BLOCKED",
            ApplicationError::StorageFull { .. } => "STORAGE_FULL",
            ApplicationError::InsufficientCapacity { .. } => "INSUFFICIENT_CAPACITY",
            ApplicationError::UploadLocked { .. } => "UPLOAD_LOCKED",
            ApplicationError::AlreadyExists(_) => "ALREADY_EXISTS",
            ApplicationError::BadRequest(_) => "BAD_REQUEST",
            ApplicationError::Unauthorized => "UNAUTHORIZED",
            ApplicationError::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            ApplicationError::PersistenceError(_) | ApplicationError::InternalError(_) => {
                "INTERNAL_ERROR"
            }
        }
    }
}

impl IntoResponse for ApplicationError {
    fn into_response(self) -> Response {
        let mut extra = Map::new();

        let (status, message) = match self {
            ApplicationError::NotFound(ref msg) => {
                warn!("Not found: {}", msg);
                (StatusCode::NOT_FOUND, msg.clone())
            }
            ApplicationError::Forbidden(ref msg) => {
                warn!("Forbidden: {}", msg);
                (StatusCode::FORBIDDEN, msg.clone())
            }
            ApplicationError::InvalidCredentials { remaining_attempts } => {
                warn!("Invalid credentials");
                if let Some(remaining) = remaining_attempts {
                    extra.insert("remainingAttempts".into(), json!(remaining));
                }
                (
                    StatusCode::UNAUTHORIZED,
                    "Invalid username or password".to_string(),
                )
            }
            ApplicationError::UserNotFound => {
                (StatusCode::NOT_FOUND, "User not found".to_string())
            }
            ApplicationError::AccountLocked { remaining_minutes } => {
                warn!("Locked account access attempt");
                extra.insert("remainingMinutes".into(), json!(remaining_minutes));
                (
                    StatusCode::LOCKED,
                    format!(
                        "Account locked. Try again in {} minute(s)",
                        remaining_minutes
                    ),
                )
            }
            ApplicationError::IpBlocked => {
                warn!("Request from blocked IP");
                (
                    StatusCode::FORBIDDEN,
                    "Your IP address has been blocked".to_string(),
                )
            }
            ApplicationError::StorageFull { percent } => {
                warn!("Upload rejected, storage at {:.1}%", percent);
                extra.insert("storageFull".into(), json!(true));
                extra.insert("uploadLocked".into(), json!(true));
                (
                    StatusCode::INSUFFICIENT_STORAGE,
                    format!("Storage is full ({:.1}%). Uploads are temporarily disabled", percent),
                )
            }
            ApplicationError::InsufficientCapacity {
                available_bytes,
                requested_bytes,
            } => {
                warn!(
                    "Upload of {} bytes exceeds remaining {} bytes",
                    requested_bytes, available_bytes
                );
                extra.insert("storageFull".into(), json!(false));
                extra.insert("availableBytes".into(), json!(available_bytes));
                (
                    StatusCode::INSUFFICIENT_STORAGE,
                    "Not enough storage left for this file".to_string(),
                )
            }
            ApplicationError::UploadLocked { ref reason } => {
                warn!("Upload rejected, uploads locked: {}", reason);
                extra.insert("uploadLocked".into(), json!(true));
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    format!("Uploads are temporarily locked: {}", reason),
                )
            }
            ApplicationError::AlreadyExists(ref msg) => (StatusCode::CONFLICT, msg.clone()),
            ApplicationError::BadRequest(ref msg) => {
                warn!("Bad request: {}", msg);
                (StatusCode::BAD_REQUEST, msg.clone())
            }
            ApplicationError::Unauthorized => {
                warn!("Unauthorized access attempt");
                (StatusCode::UNAUTHORIZED, "Unauthorized".to_string())
            }
            ApplicationError::PayloadTooLarge => {
                warn!("File too large");
                (StatusCode::PAYLOAD_TOO_LARGE, "File too large".to_string())
            }
            ApplicationError::PersistenceError(ref msg) => {
                error!("Persistence error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            ApplicationError::InternalError(ref msg) => {
                error!("Internal server error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let mut body = Map::new();
        body.insert("success".into(), json!(false));
        body.insert("message".into(), json!(message));
        body.insert("error".into(), json!(self.code()));
        body.extend(extra);

        (status, Json(Value::Object(body))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_of(error: ApplicationError) -> (StatusCode, Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn capacity_errors_carry_flags() {
        let (status, body) = body_of(ApplicationError::StorageFull { percent: 96.0 }).await;
        assert_eq!(status, StatusCode::INSUFFICIENT_STORAGE);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "STORAGE_FULL");
        assert_eq!(body["storageFull"], true);

        let (status, body) = body_of(ApplicationError::UploadLocked {
            reason: "full".into(),
        })
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["uploadLocked"], true);

        let (status, _) = body_of(ApplicationError::PayloadTooLarge).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn auth_errors_report_what_to_do_next() {
        let (status, body) = body_of(ApplicationError::InvalidCredentials {
            remaining_attempts: Some(3),
        })
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["remainingAttempts"], 3);

        let (status, body) = body_of(ApplicationError::AccountLocked {
            remaining_minutes: 7,
        })
        .await;
        assert_eq!(status, StatusCode::LOCKED);
        assert_eq!(body["remainingMinutes"], 7);
    }

    #[tokio::test]
    async fn internal_details_are_not_leaked() {
        let (status, body) =
            body_of(ApplicationError::InternalError("db password wrong".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Internal server error");
    }
}
