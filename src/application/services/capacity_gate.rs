use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::{
    application::{
        error::ApplicationError,
        services::{notification_ledger::NotificationLedger, storage_service::StorageService},
    },
    domain::{config::global::PolicyConfig, models::notification::NotificationKind},
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CapacityThresholds {
    pub warning_percent: f64,
    pub lock_percent: f64,
    /// Kept below `lock_percent` so the lock does not flap around one value.
    pub unlock_percent: f64,
}

impl Default for CapacityThresholds {
    fn default() -> Self {
        Self {
            warning_percent: 80.0,
            lock_percent: 95.0,
            unlock_percent: 90.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapacityLevel {
    Normal,
    Warning,
    Critical,
}

impl CapacityThresholds {
    pub fn from_policy(policy: &PolicyConfig) -> Self {
        Self {
            warning_percent: policy.warning_percent,
            lock_percent: policy.lock_percent,
            unlock_percent: policy.unlock_percent,
        }
    }

    pub fn classify(&self, percent: f64) -> CapacityLevel {
        if percent >= self.lock_percent {
            CapacityLevel::Critical
        } else if percent >= self.warning_percent {
            CapacityLevel::Warning
        } else {
            CapacityLevel::Normal
        }
    }

    pub fn allows_unlock(&self, percent: f64) -> bool {
        percent < self.unlock_percent
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapacityReport {
    pub used_bytes: u64,
    pub limit_bytes: u64,
    pub percent: f64,
    pub available_bytes: u64,
}

impl CapacityReport {
    pub fn new(used_bytes: u64, limit_bytes: u64) -> Self {
        let percent = if limit_bytes == 0 {
            100.0
        } else {
            used_bytes as f64 / limit_bytes as f64 * 100.0
        };

        Self {
            used_bytes,
            limit_bytes,
            percent,
            available_bytes: limit_bytes.saturating_sub(used_bytes),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadLock {
    pub reason: String,
    pub locked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageStatus {
    #[serde(flatten)]
    pub report: CapacityReport,
    pub is_storage_full: bool,
    pub upload_blocked: bool,
    pub lock_reason: Option<String>,
}

/// Admission control for uploads based on aggregate storage usage.
pub struct CapacityGate {
    storage: Arc<dyn StorageService>,
    notifications: Arc<NotificationLedger>,
    limit_bytes: u64,
    thresholds: CapacityThresholds,
    lock: RwLock<Option<UploadLock>>,
}

impl CapacityGate {
    pub fn new(
        storage: Arc<dyn StorageService>,
        notifications: Arc<NotificationLedger>,
        limit_bytes: u64,
        thresholds: CapacityThresholds,
    ) -> Self {
        Self {
            storage,
            notifications,
            limit_bytes,
            thresholds,
            lock: RwLock::new(None),
        }
    }

    pub async fn current_usage(&self) -> Result<CapacityReport, ApplicationError> {
        let used = self.storage.usage().await.map_err(|e| {
            warn!("Cannot check storage usage: {}", e);
            ApplicationError::InternalError("Cannot check storage usage".to_string())
        })?;

        Ok(CapacityReport::new(used, self.limit_bytes))
    }

    pub async fn lock_state(&self) -> Option<UploadLock> {
        self.lock.read().await.clone()
    }

    pub async fn is_locked(&self) -> bool {
        self.lock.read().await.is_some()
    }

    /// Fails fast while the global upload lock is set. Does not query storage.
    pub async fn ensure_unlocked(&self) -> Result<(), ApplicationError> {
        match self.lock.read().await.as_ref() {
            Some(lock) => Err(ApplicationError::UploadLocked {
                reason: lock.reason.clone(),
            }),
            None => Ok(()),
        }
    }

    pub async fn check_before_upload(&self, size: u64) -> Result<CapacityReport, ApplicationError> {
        self.ensure_unlocked().await?;

        let report = self.current_usage().await?;

        match self.thresholds.classify(report.percent) {
            CapacityLevel::Critical => {
                self.notifications
                    .notify(
                        NotificationKind::Critical,
                        "Storage is full, uploads are blocked",
                        json!({ "usage": report }),
                    )
                    .await;
                self.engage_lock(format!("Storage {:.1}% full", report.percent))
                    .await;
                return Err(ApplicationError::StorageFull {
                    percent: report.percent,
                });
            }
            CapacityLevel::Warning => {
                self.notifications
                    .notify(
                        NotificationKind::Warning,
                        format!("Storage almost full: {:.1}%", report.percent),
                        json!({ "usage": report }),
                    )
                    .await;
            }
            CapacityLevel::Normal => {}
        }

        if size > report.available_bytes {
            return Err(ApplicationError::InsufficientCapacity {
                available_bytes: report.available_bytes,
                requested_bytes: size,
            });
        }

        Ok(report)
    }

    async fn engage_lock(&self, reason: String) {
        let mut lock = self.lock.write().await;
        if lock.is_none() {
            warn!("Upload lock engaged: {}", reason);
            *lock = Some(UploadLock {
                reason,
                locked_at: Utc::now(),
            });
        }
    }

    /// Re-queries usage and clears the lock once it drops under the unlock threshold.
    pub async fn try_auto_unlock(&self) -> Result<bool, ApplicationError> {
        if !self.is_locked().await {
            return Ok(false);
        }

        let report = self.current_usage().await?;
        if !self.thresholds.allows_unlock(report.percent) {
            return Ok(false);
        }

        if self.lock.write().await.take().is_none() {
            return Ok(false);
        }

        info!("Upload lock released at {:.1}% usage", report.percent);
        self.notifications
            .notify(
                NotificationKind::Info,
                format!("Uploads unlocked, storage at {:.1}%", report.percent),
                json!({ "usage": report }),
            )
            .await;

        Ok(true)
    }

    pub async fn unlock_manually(&self, by: &str) -> bool {
        let released = self.lock.write().await.take().is_some();
        if released {
            info!("Upload lock released manually by {}", by);
            self.notifications
                .notify(
                    NotificationKind::Info,
                    format!("Uploads unlocked manually by {}", by),
                    json!({ "by": by }),
                )
                .await;
        }
        released
    }

    /// Periodic check: warns above the warning threshold and retries auto-unlock.
    pub async fn monitor(&self) -> Result<CapacityReport, ApplicationError> {
        let report = self.current_usage().await?;
        info!(
            "Storage usage: {} / {} bytes ({:.1}%)",
            report.used_bytes, report.limit_bytes, report.percent
        );

        if self.thresholds.classify(report.percent) != CapacityLevel::Normal {
            self.notifications
                .notify(
                    NotificationKind::Warning,
                    format!("Storage usage: {:.1}%", report.percent),
                    json!({ "usage": report }),
                )
                .await;
        }

        self.try_auto_unlock().await?;
        Ok(report)
    }

    pub async fn status(&self) -> Result<StorageStatus, ApplicationError> {
        let report = self.current_usage().await?;
        let lock = self.lock_state().await;

        Ok(StorageStatus {
            report,
            is_storage_full: self.thresholds.classify(report.percent) == CapacityLevel::Critical,
            upload_blocked: lock.is_some(),
            lock_reason: lock.map(|l| l.reason),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockStorage;

    fn gate(storage: Arc<MockStorage>, limit: u64) -> (CapacityGate, Arc<NotificationLedger>) {
        let ledger = Arc::new(NotificationLedger::default());
        let gate = CapacityGate::new(storage, ledger.clone(), limit, CapacityThresholds::default());
        (gate, ledger)
    }

    #[test]
    fn thresholds_classify_percent() {
        let t = CapacityThresholds::default();
        assert_eq!(t.classify(79.9), CapacityLevel::Normal);
        assert_eq!(t.classify(80.0), CapacityLevel::Warning);
        assert_eq!(t.classify(94.9), CapacityLevel::Warning);
        assert_eq!(t.classify(95.0), CapacityLevel::Critical);
        assert!(t.allows_unlock(89.9));
        assert!(!t.allows_unlock(90.0));
        assert!(t.unlock_percent < t.lock_percent);
    }

    #[test]
    fn report_computes_percent_and_available() {
        let report = CapacityReport::new(250, 1000);
        assert_eq!(report.percent, 25.0);
        assert_eq!(report.available_bytes, 750);

        let over = CapacityReport::new(1200, 1000);
        assert_eq!(over.available_bytes, 0);
        assert_eq!(CapacityReport::new(0, 0).percent, 100.0);
    }

    #[tokio::test]
    async fn allows_upload_under_warning_threshold() {
        let storage = Arc::new(MockStorage::new());
        storage.set_baseline(100);
        let (gate, ledger) = gate(storage, 1000);

        let report = gate.check_before_upload(50).await.unwrap();
        assert_eq!(report.used_bytes, 100);
        assert_eq!(ledger.len().await, 0);
    }

    #[tokio::test]
    async fn warns_but_allows_between_thresholds() {
        let storage = Arc::new(MockStorage::new());
        storage.set_baseline(850);
        let (gate, ledger) = gate(storage, 1000);

        gate.check_before_upload(10).await.unwrap();
        let entries = ledger.list().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, NotificationKind::Warning);
        assert!(!gate.is_locked().await);
    }

    #[tokio::test]
    async fn full_storage_locks_uploads() {
        let storage = Arc::new(MockStorage::new());
        storage.set_baseline(960);
        let (gate, ledger) = gate(storage.clone(), 1000);

        let err = gate.check_before_upload(1).await.unwrap_err();
        assert!(matches!(err, ApplicationError::StorageFull { .. }));
        assert!(gate.is_locked().await);
        assert_eq!(ledger.list().await[0].kind, NotificationKind::Critical);

        // Locked gate fails fast even after usage drops, until unlock runs.
        storage.set_baseline(0);
        let err = gate.check_before_upload(1).await.unwrap_err();
        assert!(matches!(err, ApplicationError::UploadLocked { .. }));
        assert_eq!(storage.usage_queries(), 1);
    }

    #[tokio::test]
    async fn rejects_file_larger_than_remaining_capacity() {
        let storage = Arc::new(MockStorage::new());
        storage.set_baseline(500);
        let (gate, _) = gate(storage, 1000);

        let err = gate.check_before_upload(501).await.unwrap_err();
        match err {
            ApplicationError::InsufficientCapacity {
                available_bytes,
                requested_bytes,
            } => {
                assert_eq!(available_bytes, 500);
                assert_eq!(requested_bytes, 501);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(!gate.is_locked().await);
        gate.check_before_upload(500).await.unwrap();
    }

    #[tokio::test]
    async fn auto_unlock_uses_hysteresis() {
        let storage = Arc::new(MockStorage::new());
        storage.set_baseline(950);
        let (gate, ledger) = gate(storage.clone(), 1000);
        gate.check_before_upload(1).await.unwrap_err();

        storage.set_baseline(920);
        assert!(!gate.try_auto_unlock().await.unwrap());
        assert!(gate.is_locked().await);

        storage.set_baseline(899);
        assert!(gate.try_auto_unlock().await.unwrap());
        assert!(!gate.is_locked().await);
        assert_eq!(ledger.list().await[0].kind, NotificationKind::Info);
    }

    #[tokio::test]
    async fn manual_unlock_clears_lock_once() {
        let storage = Arc::new(MockStorage::new());
        storage.set_baseline(990);
        let (gate, _) = gate(storage, 1000);
        gate.check_before_upload(1).await.unwrap_err();

        assert!(gate.unlock_manually("root").await);
        assert!(!gate.unlock_manually("root").await);
    }

    #[tokio::test]
    async fn usage_failure_is_internal_error() {
        let storage = Arc::new(MockStorage::new());
        storage.fail_usage(true);
        let (gate, _) = gate(storage, 1000);

        let err = gate.check_before_upload(1).await.unwrap_err();
        assert!(matches!(err, ApplicationError::InternalError(_)));
    }

    #[tokio::test]
    async fn status_reports_lock() {
        let storage = Arc::new(MockStorage::new());
        storage.set_baseline(970);
        let (gate, _) = gate(storage, 1000);
        gate.check_before_upload(1).await.unwrap_err();

        let status = gate.status().await.unwrap();
        assert!(status.is_storage_full);
        assert!(status.upload_blocked);
        assert!(status.lock_reason.is_some());
    }
}
