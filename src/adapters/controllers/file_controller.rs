use axum::{
    body::Body,
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use tracing::{info, warn};

use crate::{
    adapters::{
        dto::{
            admin_dto::StorageStatusResponse,
            file_dto::{FileInfoResponse, FileListResponse, UploadFileResponse},
            ApiResponse,
        },
        middleware::Caller,
        state::AppState,
    },
    application::{error::ApplicationError, services::share_code::is_valid_share_code},
    domain::models::file::FileData,
};

fn checked_code(code: &str) -> Result<(), ApplicationError> {
    if is_valid_share_code(code) {
        Ok(())
    } else {
        Err(ApplicationError::NotFound(format!("File {} not found", code)))
    }
}

/// Room for boundaries and part headers on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: u64 = 1024 * 1024;

/// Request body limit for the upload route.
pub fn upload_body_limit(max_upload_bytes: u64) -> usize {
    usize::try_from(max_upload_bytes.saturating_add(MULTIPART_OVERHEAD_BYTES)).unwrap_or(usize::MAX)
}

fn multipart_error(e: MultipartError, message: &str) -> ApplicationError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        warn!("Upload body over the limit: {}", e);
        ApplicationError::PayloadTooLarge
    } else {
        warn!("{}: {}", message, e);
        ApplicationError::BadRequest(message.to_string())
    }
}

pub struct FileController;

impl FileController {
    /// POST /api/upload
    /// Multipart: `file` (required), `username` (optional, must match the session)
    pub async fn upload_file(
        State(app_state): State<AppState>,
        Caller(identity): Caller,
        mut multipart: Multipart,
    ) -> Result<(StatusCode, Json<ApiResponse<UploadFileResponse>>), ApplicationError> {
        // Fail fast before reading the body.
        app_state.file_lifecycle.gate().ensure_unlocked().await?;

        let mut file_data: Option<FileData> = None;
        let mut username: Option<String> = None;

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| multipart_error(e, "Invalid request format"))?
        {
            let name = field.name().unwrap_or("").to_string();

            match name.as_str() {
                "file" => {
                    let filename = field
                        .file_name()
                        .map(str::to_string)
                        .filter(|n| !n.is_empty())
                        .unwrap_or_else(|| "file".to_string());
                    let mime_type = field
                        .content_type()
                        .unwrap_or("application/octet-stream")
                        .to_string();
                    let content = field
                        .bytes()
                        .await
                        .map_err(|e| multipart_error(e, "Invalid file data"))?;

                    file_data = Some(FileData::new(content.to_vec(), filename, mime_type));
                }
                "username" => {
                    username = Some(
                        field
                            .text()
                            .await
                            .map_err(|e| multipart_error(e, "Invalid request data"))?,
                    );
                }
                _ => {}
            }
        }

        let file_data = file_data.ok_or_else(|| {
            warn!("Missing required 'file' field in upload");
            ApplicationError::BadRequest("No file uploaded".to_string())
        })?;

        if let Some(ref claimed) = username {
            if claimed != identity.username() {
                warn!(
                    "Session user '{}' does not match multipart username '{}'",
                    identity.username(),
                    claimed
                );
                return Err(ApplicationError::Unauthorized);
            }
        }

        let record = app_state.file_lifecycle.upload(file_data, &identity).await?;
        let share_link = app_state.server_config.share_link(&record.code);

        Ok((
            StatusCode::CREATED,
            Json(ApiResponse::with_message(
                "File uploaded successfully",
                UploadFileResponse::new(record, share_link),
            )),
        ))
    }

    /// GET /api/file/{code}
    pub async fn get_file_info(
        State(app_state): State<AppState>,
        Path(code): Path<String>,
    ) -> Result<Json<ApiResponse<FileInfoResponse>>, ApplicationError> {
        checked_code(&code)?;
        let record = app_state.file_lifecycle.lookup(&code).await?;
        Ok(Json(ApiResponse::data(FileInfoResponse::from(record))))
    }

    /// GET /api/download/{code}
    /// Redirects to the provider URL when there is one, otherwise streams the bytes.
    pub async fn download_file(
        State(app_state): State<AppState>,
        Path(code): Path<String>,
    ) -> Result<Response, ApplicationError> {
        checked_code(&code)?;
        let record = app_state.file_lifecycle.download(&code).await?;

        if let Some(url) = &record.storage_locator.url {
            return Ok(Redirect::temporary(url).into_response());
        }

        let file_bytes = app_state.file_lifecycle.fetch_content(&record).await?;

        Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, &record.mime_type)
            .header(header::CONTENT_LENGTH, file_bytes.len())
            .header(
                header::CONTENT_DISPOSITION,
                format!(
                    "attachment; filename=\"{}\"",
                    record.original_name.replace(['"', '\\'], "_")
                ),
            )
            .body(Body::from(file_bytes))
            .map_err(|e| ApplicationError::InternalError(format!("Cannot build response: {}", e)))
    }

    /// DELETE /api/file/{code}
    pub async fn delete_file(
        State(app_state): State<AppState>,
        Caller(identity): Caller,
        Path(code): Path<String>,
    ) -> Result<Json<ApiResponse<()>>, ApplicationError> {
        checked_code(&code)?;
        app_state
            .file_lifecycle
            .delete_owned(&code, &identity)
            .await?;
        Ok(Json(ApiResponse::message("File deleted successfully")))
    }

    /// GET /api/files (admin)
    pub async fn list_files(
        State(app_state): State<AppState>,
    ) -> Result<Json<ApiResponse<FileListResponse>>, ApplicationError> {
        let files = app_state.file_lifecycle.list_all().await?;
        Ok(Json(ApiResponse::data(FileListResponse::from(files))))
    }

    /// GET /api/storage/status
    pub async fn storage_status(
        State(app_state): State<AppState>,
    ) -> Result<Json<ApiResponse<StorageStatusResponse>>, ApplicationError> {
        let status = app_state.file_lifecycle.gate().status().await?;
        let file_count = app_state.file_lifecycle.count().await?;
        info!(
            "Storage status requested: {:.1}% used, locked: {}",
            status.report.percent, status.upload_blocked
        );

        Ok(Json(ApiResponse::data(StorageStatusResponse {
            status,
            file_count,
        })))
    }
}
