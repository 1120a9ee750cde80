//! Notification fan-out: Apprise-gateway targets and raw webhooks.
//!
//! Dispatch never blocks the caller: each target gets its own spawned task
//! with an independent deadline and retry budget, and failures only log.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Value};
use sha2::Sha256;
use thiserror::Error;
use tracing::{debug, warn};

use crate::redact::safe_url;
use crate::registry::{NotificationTarget, NotifyEvent, SqliteRegistry, TargetKind};

const TARGET_TIMEOUT_SECS: u64 = 10;
const TARGET_RETRIES: u32 = 3;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("No Apprise gateway configured")]
    NoGateway,

    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("Target returned HTTP {0}")]
    Rejected(u16),
}

/// The event classes a notification can carry. `Test` bypasses target masks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    DownloadStart,
    DownloadComplete,
    DownloadFail,
    Test,
}

impl NotificationKind {
    pub fn matches_mask(&self, mask: &[NotifyEvent]) -> bool {
        match self {
            NotificationKind::Test => true,
            NotificationKind::DownloadStart => mask.contains(&NotifyEvent::DownloadStart),
            NotificationKind::DownloadComplete => mask.contains(&NotifyEvent::DownloadComplete),
            NotificationKind::DownloadFail => mask.contains(&NotifyEvent::DownloadFail),
        }
    }
}

/// One notification to fan out.
#[derive(Debug, Clone)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub payload: Value,
}

/// Seam for the scheduler; the production impl is [`NotificationDispatcher`].
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Fan out to matching targets. Returns once delivery tasks are spawned.
    async fn notify(&self, notification: Notification);
}

pub struct NotificationDispatcher {
    client: Client,
    registry: Arc<SqliteRegistry>,
    apprise_gateway: Option<String>,
}

impl NotificationDispatcher {
    pub fn new(registry: Arc<SqliteRegistry>, apprise_gateway: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(TARGET_TIMEOUT_SECS))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            registry,
            apprise_gateway,
        }
    }

    /// Deliver to every matching target and wait for the outcomes. Used by
    /// the operator test path; the scheduler goes through [`Notifier`].
    pub async fn dispatch_and_wait(
        &self,
        notification: &Notification,
    ) -> Vec<(String, Result<(), NotifyError>)> {
        let targets = match self.registry.list_targets() {
            Ok(targets) => targets,
            Err(e) => {
                warn!(error = %e, "Failed to load notification targets");
                return Vec::new();
            }
        };

        let matching: Vec<NotificationTarget> = targets
            .into_iter()
            .filter(|t| notification.kind.matches_mask(&t.event_mask))
            .collect();

        let deliveries = matching.into_iter().map(|target| async move {
            let name = target.name.clone();
            let result = self.deliver_with_retry(&target, notification).await;
            (name, result)
        });
        futures::future::join_all(deliveries).await
    }

    async fn deliver_with_retry(
        &self,
        target: &NotificationTarget,
        notification: &Notification,
    ) -> Result<(), NotifyError> {
        let mut last_err = NotifyError::Delivery("no attempt made".to_string());
        for attempt in 1..=TARGET_RETRIES {
            match self.deliver(target, notification).await {
                Ok(()) => {
                    debug!(
                        target = %target.name,
                        host = %safe_url(&target.url),
                        attempt,
                        "Notification delivered"
                    );
                    return Ok(());
                }
                Err(e @ NotifyError::NoGateway) => return Err(e),
                Err(e) => {
                    warn!(
                        target = %target.name,
                        host = %safe_url(&target.url),
                        attempt,
                        error = %e,
                        "Notification delivery failed"
                    );
                    last_err = e;
                }
            }
        }
        Err(last_err)
    }

    async fn deliver(
        &self,
        target: &NotificationTarget,
        notification: &Notification,
    ) -> Result<(), NotifyError> {
        match target.kind {
            TargetKind::Apprise => self.deliver_apprise(target, notification).await,
            TargetKind::Webhook => self.deliver_webhook(target, notification).await,
        }
    }

    /// Scheme-to-service mapping is delegated to an Apprise API gateway: the
    /// target URL is passed through as the notification destination.
    async fn deliver_apprise(
        &self,
        target: &NotificationTarget,
        notification: &Notification,
    ) -> Result<(), NotifyError> {
        let gateway = self
            .apprise_gateway
            .as_deref()
            .ok_or(NotifyError::NoGateway)?;
        let url = format!("{}/notify", gateway.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .json(&json!({
                "urls": target.url,
                "title": notification.title,
                "body": notification.body,
            }))
            .send()
            .await
            .map_err(|e| NotifyError::Delivery(e.to_string()))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(NotifyError::Rejected(response.status().as_u16()))
        }
    }

    async fn deliver_webhook(
        &self,
        target: &NotificationTarget,
        notification: &Notification,
    ) -> Result<(), NotifyError> {
        let body = json!({
            "type": notification.kind,
            "payload": {
                "title": notification.title,
                "message": notification.body,
                "data": notification.payload,
            },
        });
        let body_bytes =
            serde_json::to_vec(&body).map_err(|e| NotifyError::Delivery(e.to_string()))?;

        let mut request = self
            .client
            .post(&target.url)
            .header("content-type", "application/json");
        if let Some(secret) = &target.webhook_secret {
            request = request.header("X-Signature", sign_payload(secret, &body_bytes));
        }

        let response = request
            .body(body_bytes)
            .send()
            .await
            .map_err(|e| NotifyError::Delivery(e.to_string()))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(NotifyError::Rejected(response.status().as_u16()))
        }
    }
}

#[async_trait]
impl Notifier for NotificationDispatcher {
    async fn notify(&self, notification: Notification) {
        let targets = match self.registry.list_targets() {
            Ok(targets) => targets,
            Err(e) => {
                warn!(error = %e, "Failed to load notification targets");
                return;
            }
        };

        for target in targets {
            if !notification.kind.matches_mask(&target.event_mask) {
                continue;
            }
            // The task owns its own handle; reqwest clients clone cheaply.
            let task = NotificationDispatcher {
                client: self.client.clone(),
                registry: Arc::clone(&self.registry),
                apprise_gateway: self.apprise_gateway.clone(),
            };
            let notification = notification.clone();
            tokio::spawn(async move {
                let _ = task.deliver_with_retry(&target, &notification).await;
            });
        }
    }
}

/// `sha256=<hex>` HMAC of the request body.
pub fn sign_payload(secret: &str, body: &[u8]) -> String {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body);
    format!("sha256={:x}", mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_filtering() {
        let mask = vec![NotifyEvent::DownloadComplete];
        assert!(NotificationKind::DownloadComplete.matches_mask(&mask));
        assert!(!NotificationKind::DownloadStart.matches_mask(&mask));
        assert!(!NotificationKind::DownloadFail.matches_mask(&mask));
    }

    #[test]
    fn test_test_kind_ignores_mask() {
        assert!(NotificationKind::Test.matches_mask(&[]));
        assert!(NotificationKind::Test.matches_mask(&[NotifyEvent::DownloadFail]));
    }

    #[test]
    fn test_sign_payload_shape_and_determinism() {
        let a = sign_payload("whsec", b"{\"x\":1}");
        let b = sign_payload("whsec", b"{\"x\":1}");
        assert_eq!(a, b);
        assert!(a.starts_with("sha256="));
        assert_eq!(a.len(), "sha256=".len() + 64);

        let other_secret = sign_payload("different", b"{\"x\":1}");
        assert_ne!(a, other_secret);
        let other_body = sign_payload("whsec", b"{\"x\":2}");
        assert_ne!(a, other_body);
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&NotificationKind::DownloadStart).unwrap(),
            "\"download_start\""
        );
    }
}
