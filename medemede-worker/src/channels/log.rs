//! Sender that only writes the notification to the log

use async_trait::async_trait;
use medemede_shared::models::notification::{NotificationChannel, NotificationLog};
use uuid::Uuid;

use super::{Delivery, NotificationSender, SendResult};

/// Stands in for a provider in development
pub struct LogSender {
    channel: NotificationChannel,
}

impl LogSender {
    pub fn new(channel: NotificationChannel) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl NotificationSender for LogSender {
    fn name(&self) -> &str {
        "log"
    }

    fn channel(&self) -> NotificationChannel {
        self.channel
    }

    async fn send(&self, notification: &NotificationLog) -> SendResult<Delivery> {
        tracing::info!(
            notification_id = %notification.id,
            channel = %self.channel,
            recipient = %notification.recipient,
            subject = ?notification.subject,
            message = %notification.message,
            "Notification (log only)"
        );
        Ok(Delivery {
            external_id: Some(format!("log-{}", Uuid::new_v4())),
        })
    }
}
