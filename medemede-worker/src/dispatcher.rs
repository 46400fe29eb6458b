//! Notification dispatcher
//!
//! Drains the notification outbox:
//!
//! ```text
//! loop
//!   ├─> claim up to `batch_size` pending rows for channels with a sender
//!   ├─> send each (at most `max_concurrent` at once, each under `send_timeout`)
//!   ├─> mark sent with the provider id, or failed with the error
//!   └─> sleep `poll_interval` unless the batch was full
//! ```
//!
//! Rows on channels with no registered sender are never claimed.

use futures::stream::{self, StreamExt};
use medemede_shared::models::notification::{NotificationChannel, NotificationLog};
use medemede_shared::storage::{Storage, StorageError};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::channels::{NotificationSender, SendError};

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub poll_interval: Duration,

    pub batch_size: usize,

    pub max_concurrent: usize,

    pub send_timeout: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(2000),
            batch_size: 20,
            max_concurrent: 5,
            send_timeout: Duration::from_secs(15),
        }
    }
}

/// Outcome of one dispatch pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub claimed: usize,
    pub sent: usize,
    pub failed: usize,
}

enum Outcome {
    Sent,
    Failed,
}

pub struct Dispatcher {
    storage: Arc<dyn Storage>,
    senders: HashMap<NotificationChannel, Arc<dyn NotificationSender>>,
    config: DispatcherConfig,
    shutdown_token: CancellationToken,
}

impl Dispatcher {
    pub fn new(storage: Arc<dyn Storage>, config: DispatcherConfig) -> Self {
        Self {
            storage,
            senders: HashMap::new(),
            config,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Registers the sender for its channel, replacing any previous one
    pub fn register_sender(&mut self, sender: Arc<dyn NotificationSender>) {
        tracing::info!(sender = sender.name(), channel = %sender.channel(), "Registering notification sender");
        self.senders.insert(sender.channel(), sender);
    }

    pub fn with_senders(mut self, senders: impl IntoIterator<Item = Arc<dyn NotificationSender>>) -> Self {
        for sender in senders {
            self.register_sender(sender);
        }
        self
    }

    /// Used to signal graceful shutdown from outside the loop
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    pub fn channels(&self) -> Vec<NotificationChannel> {
        self.senders.keys().copied().collect()
    }

    /// Runs until the shutdown token is cancelled
    ///
    /// Storage errors are logged and the loop carries on after the poll
    /// interval.
    pub async fn run(&self) {
        if self.senders.is_empty() {
            tracing::warn!("No notification senders configured, dispatcher idle");
            self.shutdown_token.cancelled().await;
            return;
        }

        tracing::info!(
            channels = ?self.channels(),
            batch_size = self.config.batch_size,
            "Notification dispatcher starting"
        );

        loop {
            let full_batch = match self.dispatch_once().await {
                Ok(report) => {
                    if report.claimed > 0 {
                        tracing::info!(
                            claimed = report.claimed,
                            sent = report.sent,
                            failed = report.failed,
                            "Dispatched notifications"
                        );
                    }
                    report.claimed >= self.config.batch_size
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to claim notifications");
                    false
                }
            };

            if self.shutdown_token.is_cancelled() {
                break;
            }
            if full_batch {
                continue;
            }

            tokio::select! {
                _ = self.shutdown_token.cancelled() => break,
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }

        tracing::info!("Notification dispatcher stopped");
    }

    /// Claims one batch and sends it
    pub async fn dispatch_once(&self) -> Result<DispatchReport, StorageError> {
        let channels = self.channels();
        if channels.is_empty() {
            return Ok(DispatchReport::default());
        }

        let batch = self
            .storage
            .claim_pending_notifications(&channels, self.config.batch_size)
            .await?;

        let mut report = DispatchReport {
            claimed: batch.len(),
            ..Default::default()
        };

        let outcomes: Vec<Outcome> = stream::iter(batch)
            .map(|notification| self.deliver(notification))
            .buffer_unordered(self.config.max_concurrent.max(1))
            .collect()
            .await;

        for outcome in outcomes {
            match outcome {
                Outcome::Sent => report.sent += 1,
                Outcome::Failed => report.failed += 1,
            }
        }
        Ok(report)
    }

    async fn deliver(&self, notification: NotificationLog) -> Outcome {
        let result = match self.senders.get(&notification.channel) {
            Some(sender) => {
                match tokio::time::timeout(self.config.send_timeout, sender.send(&notification)).await {
                    Ok(result) => result,
                    Err(_) => Err(SendError::Timeout),
                }
            }
            None => Err(SendError::Provider {
                status: 0,
                message: format!("No sender for channel {}", notification.channel),
            }),
        };

        match result {
            Ok(delivery) => {
                tracing::debug!(
                    notification_id = %notification.id,
                    channel = %notification.channel,
                    external_id = ?delivery.external_id,
                    "Notification sent"
                );
                if let Err(e) = self
                    .storage
                    .mark_notification_sent(notification.id, delivery.external_id)
                    .await
                {
                    tracing::error!(notification_id = %notification.id, error = %e, "Failed to mark notification sent");
                }
                Outcome::Sent
            }
            Err(send_error) => {
                tracing::warn!(
                    notification_id = %notification.id,
                    channel = %notification.channel,
                    error = %send_error,
                    "Notification failed"
                );
                if let Err(e) = self
                    .storage
                    .mark_notification_failed(notification.id, &send_error.to_string())
                    .await
                {
                    tracing::error!(notification_id = %notification.id, error = %e, "Failed to mark notification failed");
                }
                Outcome::Failed
            }
        }
    }
}
