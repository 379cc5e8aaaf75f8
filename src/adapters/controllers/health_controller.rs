use axum::{extract::State, Json};
use chrono::Utc;
use serde::Serialize;
use sysinfo::System;
use tracing::info;

use crate::{adapters::state::AppState, application::error::ApplicationError};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub success: bool,
    pub status: String,
    pub message: String,
    #[serde(rename = "uptimeSeconds")]
    pub uptime_seconds: i64,
    #[serde(rename = "filesCount")]
    pub files_count: usize,
    pub provider: String,
    #[serde(rename = "uploadLocked")]
    pub upload_locked: bool,
    pub metrics: SystemMetrics,
}

#[derive(Debug, Serialize)]
pub struct SystemMetrics {
    #[serde(rename = "cpuUsagePercent")]
    pub cpu_usage_percent: f32,
    #[serde(rename = "memoryUsedBytes")]
    pub memory_used_bytes: u64,
    #[serde(rename = "memoryTotalBytes")]
    pub memory_total_bytes: u64,
    #[serde(rename = "memoryUsagePercent")]
    pub memory_usage_percent: f32,
}

pub struct HealthController;

impl HealthController {
    /// GET /api/health
    pub async fn health_check(
        State(app_state): State<AppState>,
    ) -> Result<Json<HealthResponse>, ApplicationError> {
        info!("Health check requested");

        let files_count = app_state.file_lifecycle.count().await?;
        let upload_locked = app_state.file_lifecycle.gate().is_locked().await;

        // Only refresh what's reported
        let mut sys = System::new();
        sys.refresh_cpu_usage();
        sys.refresh_memory();

        let memory_used = sys.used_memory();
        let memory_total = sys.total_memory();
        let memory_usage_percent = if memory_total > 0 {
            (memory_used as f32 / memory_total as f32) * 100.0
        } else {
            0.0
        };

        Ok(Json(HealthResponse {
            success: true,
            status: "healthy".to_string(),
            message: "Server is running".to_string(),
            uptime_seconds: (Utc::now() - app_state.started_at).num_seconds(),
            files_count,
            provider: format!("{:?}", app_state.server_config.provider),
            upload_locked,
            metrics: SystemMetrics {
                cpu_usage_percent: sys.global_cpu_usage(),
                memory_used_bytes: memory_used,
                memory_total_bytes: memory_total,
                memory_usage_percent,
            },
        }))
    }
}
