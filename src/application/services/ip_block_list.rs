use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use tokio::sync::Mutex;
use tracing::warn;

use crate::{
    application::{error::ApplicationError, services::notification_ledger::NotificationLedger},
    domain::models::{notification::NotificationKind, security::IpBlockState},
};

/// Per-IP blocks. A temporary block may be upgraded to permanent, never the reverse.
pub struct IpBlockList {
    temporary_duration: Duration,
    notifications: Arc<NotificationLedger>,
    blocks: Mutex<HashMap<String, IpBlockState>>,
}

impl IpBlockList {
    pub fn new(temporary_duration: Duration, notifications: Arc<NotificationLedger>) -> Self {
        Self {
            temporary_duration,
            notifications,
            blocks: Mutex::new(HashMap::new()),
        }
    }

    pub async fn is_blocked_at(&self, ip: &str, now: DateTime<Utc>) -> bool {
        let mut blocks = self.blocks.lock().await;
        match blocks.get(ip) {
            Some(block) if block.is_active_at(now) => true,
            Some(_) => {
                blocks.remove(ip);
                false
            }
            None => false,
        }
    }

    pub async fn ensure_allowed_at(&self, ip: &str, now: DateTime<Utc>) -> Result<(), ApplicationError> {
        if self.is_blocked_at(ip, now).await {
            return Err(ApplicationError::IpBlocked);
        }
        Ok(())
    }

    pub async fn block_at(&self, ip: &str, reason: &str, permanent: bool, now: DateTime<Utc>) {
        let newly_blocked = {
            let mut blocks = self.blocks.lock().await;
            match blocks.get_mut(ip) {
                Some(existing) if existing.is_active_at(now) => {
                    if permanent && !existing.permanent {
                        existing.permanent = true;
                        existing.blocked_until = None;
                        warn!("IP {} upgraded to permanent block", ip);
                    }
                    false
                }
                _ => {
                    blocks.insert(
                        ip.to_string(),
                        IpBlockState {
                            reason: reason.to_string(),
                            blocked_at: now,
                            permanent,
                            blocked_until: (!permanent).then(|| now + self.temporary_duration),
                        },
                    );
                    true
                }
            }
        };

        if newly_blocked {
            let scope = if permanent { "permanently" } else { "temporarily" };
            warn!("IP {} blocked {}: {}", ip, scope, reason);
            self.notifications
                .notify(
                    NotificationKind::IpBlocked,
                    format!("IP {} blocked {}", ip, scope),
                    json!({ "ip": ip, "reason": reason, "permanent": permanent }),
                )
                .await;
        }
    }

    pub async fn state(&self, ip: &str) -> Option<IpBlockState> {
        self.blocks.lock().await.get(ip).cloned()
    }

    pub async fn list(&self) -> Vec<(String, IpBlockState)> {
        self.blocks
            .lock()
            .await
            .iter()
            .map(|(ip, state)| (ip.clone(), state.clone()))
            .collect()
    }
}
