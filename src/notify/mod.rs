//! Notification dispatcher.
//!
//! Persistence is the durability guarantee; live delivery through a
//! `NotificationSink` is a convenience layer on top. Delivery failures are
//! logged and never surface to callers.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast;

use crate::db::Repository;
use crate::errors::AppError;
use crate::models::Notification;

/// Failure of a live delivery attempt. Never propagated past the dispatcher.
#[derive(Debug)]
pub struct DeliveryError(pub String);

impl std::fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "delivery failed: {}", self.0)
    }
}

impl std::error::Error for DeliveryError {}

/// Capability interface for live notification channels. Absence of a live
/// channel is a `NoopSink`, not a runtime probe for optional functionality.
pub trait NotificationSink: Send + Sync {
    fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError>;
}

/// Sink for deployments without a live channel.
pub struct NoopSink;

impl NotificationSink for NoopSink {
    fn deliver(&self, _notification: &Notification) -> Result<(), DeliveryError> {
        Ok(())
    }
}

/// Fan-out to in-process subscribers over a broadcast channel. Having no
/// connected subscriber is not a failure.
pub struct BroadcastSink {
    sender: broadcast::Sender<Notification>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }
}

impl NotificationSink for BroadcastSink {
    fn deliver(&self, notification: &Notification) -> Result<(), DeliveryError> {
        // A send error only means nobody is listening right now.
        let _ = self.sender.send(notification.clone());
        Ok(())
    }
}

/// Persists notifications, then attempts best-effort live delivery.
pub struct Notifier {
    repo: Arc<Repository>,
    sink: Arc<dyn NotificationSink>,
}

impl Notifier {
    pub fn new(repo: Arc<Repository>, sink: Arc<dyn NotificationSink>) -> Self {
        Self { repo, sink }
    }

    /// Create and dispatch a notification. A null `employee_id` is a tenant
    /// broadcast. The returned record reflects what was persisted.
    #[allow(clippy::too_many_arguments)]
    pub async fn notify(
        &self,
        employee_id: Option<&str>,
        company_id: &str,
        title: &str,
        message: &str,
        notification_type: &str,
        category: &str,
        metadata: Option<serde_json::Value>,
    ) -> Result<Notification, AppError> {
        let notification = Notification {
            id: uuid::Uuid::new_v4().to_string(),
            company_id: company_id.to_string(),
            employee_id: employee_id.map(String::from),
            title: title.to_string(),
            message: message.to_string(),
            notification_type: notification_type.to_string(),
            category: category.to_string(),
            is_read: false,
            metadata: metadata.unwrap_or(serde_json::Value::Null),
            created_at: Utc::now(),
        };

        // Durable first; live delivery must not be able to lose this.
        self.repo.insert_notification(&notification).await?;

        if let Err(e) = self.sink.deliver(&notification) {
            tracing::warn!(
                notification_id = %notification.id,
                "Live notification delivery failed: {}",
                e
            );
        }

        Ok(notification)
    }
}
