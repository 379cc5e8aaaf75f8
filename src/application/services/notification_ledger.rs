use std::collections::VecDeque;

use tokio::sync::RwLock;
use tracing::info;

use crate::domain::models::notification::{Notification, NotificationKind};

pub const DEFAULT_NOTIFICATION_CAPACITY: usize = 100;

/// Bounded, newest-first feed of events for the owner console.
pub struct NotificationLedger {
    capacity: usize,
    entries: RwLock<VecDeque<Notification>>,
}

impl NotificationLedger {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: RwLock::new(VecDeque::with_capacity(capacity.max(1))),
        }
    }

    pub async fn push(&self, notification: Notification) {
        info!(
            kind = ?notification.kind,
            "Admin notification: {}",
            notification.message
        );

        let mut entries = self.entries.write().await;
        entries.push_front(notification);
        entries.truncate(self.capacity);
    }

    pub async fn notify(
        &self,
        kind: NotificationKind,
        message: impl Into<String>,
        details: serde_json::Value,
    ) {
        self.push(Notification::new(kind, message, details)).await;
    }

    pub async fn list(&self) -> Vec<Notification> {
        self.entries.read().await.iter().cloned().collect()
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

impl Default for NotificationLedger {
    fn default() -> Self {
        Self::new(DEFAULT_NOTIFICATION_CAPACITY)
    }
}
