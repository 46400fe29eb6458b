//! Notification delivery channels
//!
//! A [`NotificationSender`] delivers one notification log row over one
//! channel and reports the provider's message id. Senders never retry; the
//! dispatcher records whatever they return.

pub mod log;
pub mod sendgrid;
pub mod twilio;

pub use log::LogSender;
pub use sendgrid::{SendGridConfig, SendGridSender};
pub use twilio::{TwilioConfig, TwilioSender};

use async_trait::async_trait;
use medemede_shared::models::notification::{NotificationChannel, NotificationLog};

#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider rejected message ({status}): {message}")]
    Provider { status: u16, message: String },

    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("Send timed out")]
    Timeout,
}

pub type SendResult<T> = Result<T, SendError>;

/// Provider acknowledgement for a delivered notification
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Twilio message SID, SendGrid message id, ...
    pub external_id: Option<String>,
}

#[async_trait]
pub trait NotificationSender: Send + Sync {
    /// Sender name for logs
    fn name(&self) -> &str;

    fn channel(&self) -> NotificationChannel;

    async fn send(&self, notification: &NotificationLog) -> SendResult<Delivery>;
}

/// Reads an error body as text, capped for log and database storage
pub(crate) async fn error_message(response: reqwest::Response) -> String {
    const MAX: usize = 500;
    let status = response.status();
    match response.text().await {
        Ok(body) if !body.trim().is_empty() => body.chars().take(MAX).collect(),
        _ => status.to_string(),
    }
}
