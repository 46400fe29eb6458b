/// Dispatcher tests against the in-memory store

use async_trait::async_trait;
use medemede_shared::models::notification::{
    NewNotification, NotificationChannel, NotificationLog, NotificationStatus,
};
use medemede_shared::storage::{MemoryStorage, Storage};
use medemede_worker::channels::{Delivery, NotificationSender, SendError, SendResult};
use medemede_worker::dispatcher::{DispatchReport, Dispatcher, DispatcherConfig};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Records every notification it is asked to send
struct RecordingSender {
    channel: NotificationChannel,
    sent: Mutex<Vec<String>>,
}

impl RecordingSender {
    fn new(channel: NotificationChannel) -> Arc<Self> {
        Arc::new(Self {
            channel,
            sent: Mutex::new(Vec::new()),
        })
    }

    fn recipients(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSender for RecordingSender {
    fn name(&self) -> &str {
        "recording"
    }

    fn channel(&self) -> NotificationChannel {
        self.channel
    }

    async fn send(&self, notification: &NotificationLog) -> SendResult<Delivery> {
        self.sent.lock().unwrap().push(notification.recipient.clone());
        Ok(Delivery {
            external_id: Some(format!("ext-{}", notification.id)),
        })
    }
}

struct FailingSender;

#[async_trait]
impl NotificationSender for FailingSender {
    fn name(&self) -> &str {
        "failing"
    }

    fn channel(&self) -> NotificationChannel {
        NotificationChannel::Email
    }

    async fn send(&self, _notification: &NotificationLog) -> SendResult<Delivery> {
        Err(SendError::Provider {
            status: 401,
            message: "bad api key".to_string(),
        })
    }
}

struct StuckSender;

#[async_trait]
impl NotificationSender for StuckSender {
    fn name(&self) -> &str {
        "stuck"
    }

    fn channel(&self) -> NotificationChannel {
        NotificationChannel::Sms
    }

    async fn send(&self, _notification: &NotificationLog) -> SendResult<Delivery> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(Delivery::default())
    }
}

async fn enqueue(storage: &MemoryStorage, channel: NotificationChannel, recipient: &str) {
    storage
        .enqueue_notification(NewNotification {
            user_id: None,
            order_id: None,
            channel,
            recipient: recipient.to_string(),
            subject: None,
            message: "Your order is being prepared for delivery.".to_string(),
        })
        .await
        .unwrap();
}

fn config(batch_size: usize) -> DispatcherConfig {
    DispatcherConfig {
        poll_interval: Duration::from_millis(10),
        batch_size,
        max_concurrent: 3,
        send_timeout: Duration::from_secs(5),
    }
}

#[tokio::test]
async fn test_sends_and_marks_sent() {
    let storage = Arc::new(MemoryStorage::new());
    enqueue(&storage, NotificationChannel::Sms, "+265111").await;
    enqueue(&storage, NotificationChannel::Sms, "+265222").await;

    let sms = RecordingSender::new(NotificationChannel::Sms);
    let mut dispatcher = Dispatcher::new(storage.clone(), config(10));
    dispatcher.register_sender(sms.clone());

    let report = dispatcher.dispatch_once().await.unwrap();
    assert_eq!(
        report,
        DispatchReport {
            claimed: 2,
            sent: 2,
            failed: 0
        }
    );

    let mut recipients = sms.recipients();
    recipients.sort();
    assert_eq!(recipients, vec!["+265111", "+265222"]);

    let rows = storage.recent_notifications(10).await.unwrap();
    assert!(rows.iter().all(|n| n.status == NotificationStatus::Sent));
    assert!(rows.iter().all(|n| n.sent_at.is_some()));
    assert!(rows
        .iter()
        .all(|n| n.external_id.as_deref().is_some_and(|id| id.starts_with("ext-"))));

    let again = dispatcher.dispatch_once().await.unwrap();
    assert_eq!(again.claimed, 0);
}

#[tokio::test]
async fn test_unconfigured_channel_stays_pending() {
    let storage = Arc::new(MemoryStorage::new());
    enqueue(&storage, NotificationChannel::Sms, "+265111").await;
    enqueue(&storage, NotificationChannel::Email, "a@b.mw").await;

    let mut dispatcher = Dispatcher::new(storage.clone(), config(10));
    dispatcher.register_sender(RecordingSender::new(NotificationChannel::Sms));

    let report = dispatcher.dispatch_once().await.unwrap();
    assert_eq!(report.claimed, 1);

    let rows = storage.recent_notifications(10).await.unwrap();
    let email = rows
        .iter()
        .find(|n| n.channel == NotificationChannel::Email)
        .unwrap();
    assert_eq!(email.status, NotificationStatus::Pending);
}

#[tokio::test]
async fn test_failure_is_recorded_not_retried() {
    let storage = Arc::new(MemoryStorage::new());
    enqueue(&storage, NotificationChannel::Email, "a@b.mw").await;

    let mut dispatcher = Dispatcher::new(storage.clone(), config(10));
    dispatcher.register_sender(Arc::new(FailingSender));

    let report = dispatcher.dispatch_once().await.unwrap();
    assert_eq!(report.failed, 1);

    let row = storage.recent_notifications(1).await.unwrap().remove(0);
    assert_eq!(row.status, NotificationStatus::Failed);
    assert!(row.error.unwrap().contains("bad api key"));

    assert_eq!(dispatcher.dispatch_once().await.unwrap().claimed, 0);
}

#[tokio::test(start_paused = true)]
async fn test_send_timeout_marks_failed() {
    let storage = Arc::new(MemoryStorage::new());
    enqueue(&storage, NotificationChannel::Sms, "+265111").await;

    let mut dispatcher = Dispatcher::new(storage.clone(), config(10));
    dispatcher.register_sender(Arc::new(StuckSender));

    let report = dispatcher.dispatch_once().await.unwrap();
    assert_eq!(report.failed, 1);

    let row = storage.recent_notifications(1).await.unwrap().remove(0);
    assert_eq!(row.error.as_deref(), Some("Send timed out"));
}

#[tokio::test]
async fn test_batch_size_limits_claims() {
    let storage = Arc::new(MemoryStorage::new());
    for i in 0..5 {
        enqueue(&storage, NotificationChannel::Sms, &format!("+26500{}", i)).await;
    }

    let mut dispatcher = Dispatcher::new(storage.clone(), config(2));
    dispatcher.register_sender(RecordingSender::new(NotificationChannel::Sms));

    assert_eq!(dispatcher.dispatch_once().await.unwrap().claimed, 2);
    assert_eq!(dispatcher.dispatch_once().await.unwrap().claimed, 2);
    assert_eq!(dispatcher.dispatch_once().await.unwrap().claimed, 1);
}

#[tokio::test]
async fn test_run_drains_then_stops_on_cancel() {
    let storage = Arc::new(MemoryStorage::new());
    for i in 0..4 {
        enqueue(&storage, NotificationChannel::Sms, &format!("+26500{}", i)).await;
    }

    let sms = RecordingSender::new(NotificationChannel::Sms);
    let dispatcher = Arc::new(
        Dispatcher::new(storage.clone(), config(3)).with_senders([sms.clone() as Arc<dyn NotificationSender>]),
    );
    let token = dispatcher.shutdown_token();

    let handle = tokio::spawn({
        let dispatcher = dispatcher.clone();
        async move { dispatcher.run().await }
    });

    for _ in 0..100 {
        if sms.recipients().len() == 4 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    token.cancel();
    handle.await.unwrap();

    assert_eq!(sms.recipients().len(), 4);
}

#[tokio::test]
async fn test_idle_without_senders() {
    let storage = Arc::new(MemoryStorage::new());
    enqueue(&storage, NotificationChannel::Sms, "+265111").await;

    let dispatcher = Dispatcher::new(storage.clone(), config(10));
    assert_eq!(dispatcher.dispatch_once().await.unwrap(), DispatchReport::default());

    let token = dispatcher.shutdown_token();
    token.cancel();
    dispatcher.run().await;

    let row = storage.recent_notifications(1).await.unwrap().remove(0);
    assert_eq!(row.status, NotificationStatus::Pending);
}
