//! Mock notifier that records what would have been sent.

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::notify::{Notification, NotificationKind, Notifier};

pub struct MockNotifier {
    notifications: Mutex<Vec<Notification>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self {
            notifications: Mutex::new(Vec::new()),
        }
    }

    pub async fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().await.clone()
    }

    pub async fn kinds(&self) -> Vec<NotificationKind> {
        self.notifications
            .lock()
            .await
            .iter()
            .map(|n| n.kind)
            .collect()
    }
}

impl Default for MockNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn notify(&self, notification: Notification) {
        self.notifications.lock().await.push(notification);
    }
}
