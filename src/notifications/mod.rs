//! Invitation notification boundary.
//!
//! Delivery itself (SMTP, webhooks, whatever the deployment wires in)
//! is an external collaborator; the pipeline only needs a per-recipient
//! success/failure report and must never let a delivery failure roll
//! back a state transition.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// One rendered notification for one recipient.
#[derive(Debug, Clone)]
pub struct Notification {
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, thiserror::Error)]
#[error("notification to {recipient} failed: {reason}")]
pub struct NotifyError {
    pub recipient: String,
    pub reason: String,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Attempts delivery to one recipient.
    async fn notify(&self, notification: Notification) -> Result<(), NotifyError>;
}

/// Default notifier: logs the dispatch and reports success. Production
/// deployments inject a real transport behind the same trait.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        info!(
            recipient = %notification.recipient,
            subject = %notification.subject,
            "dispatching invitation notification"
        );
        Ok(())
    }
}

/// Test double that records every notification and can be told to fail.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<Notification>>,
    pub fail_recipients: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        if self
            .fail_recipients
            .lock()
            .await
            .contains(&notification.recipient)
        {
            return Err(NotifyError {
                recipient: notification.recipient,
                reason: "forced failure".to_string(),
            });
        }
        self.sent.lock().await.push(notification);
        Ok(())
    }
}
