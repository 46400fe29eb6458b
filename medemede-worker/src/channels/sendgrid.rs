//! Email through SendGrid's v3 mail send API

use async_trait::async_trait;
use medemede_shared::models::notification::{NotificationChannel, NotificationLog};
use serde::Serialize;

use super::{error_message, Delivery, NotificationSender, SendError, SendResult};

const SENDGRID_API: &str = "https://api.sendgrid.com/v3";
pub const DEFAULT_FROM_EMAIL: &str = "noreply@mede-mede.mw";
const DEFAULT_SUBJECT: &str = "Mede-Mede Spot";

#[derive(Debug, Clone)]
pub struct SendGridConfig {
    pub api_key: String,

    pub from_email: String,
}

#[derive(Debug, Serialize)]
struct Address<'a> {
    email: &'a str,
}

#[derive(Debug, Serialize)]
struct Personalization<'a> {
    to: [Address<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Content {
    #[serde(rename = "type")]
    kind: &'static str,
    value: String,
}

#[derive(Debug, Serialize)]
struct MailSend<'a> {
    personalizations: [Personalization<'a>; 1],
    from: Address<'a>,
    subject: &'a str,
    content: [Content; 2],
}

/// Escapes text for the HTML part
fn html_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

pub struct SendGridSender {
    client: reqwest::Client,
    config: SendGridConfig,
    base_url: String,
}

impl SendGridSender {
    pub fn new(config: SendGridConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            base_url: SENDGRID_API.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn body<'a>(&'a self, notification: &'a NotificationLog) -> MailSend<'a> {
        MailSend {
            personalizations: [Personalization {
                to: [Address {
                    email: &notification.recipient,
                }],
            }],
            from: Address {
                email: &self.config.from_email,
            },
            subject: notification.subject.as_deref().unwrap_or(DEFAULT_SUBJECT),
            content: [
                Content {
                    kind: "text/plain",
                    value: notification.message.clone(),
                },
                Content {
                    kind: "text/html",
                    value: format!("<p>{}</p>", html_escape(&notification.message)),
                },
            ],
        }
    }
}

#[async_trait]
impl NotificationSender for SendGridSender {
    fn name(&self) -> &str {
        "sendgrid"
    }

    fn channel(&self) -> NotificationChannel {
        NotificationChannel::Email
    }

    async fn send(&self, notification: &NotificationLog) -> SendResult<Delivery> {
        if !notification.recipient.contains('@') {
            return Err(SendError::InvalidRecipient(notification.recipient.clone()));
        }

        let response = self
            .client
            .post(format!("{}/mail/send", self.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&self.body(notification))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SendError::Provider {
                status: status.as_u16(),
                message: error_message(response).await,
            });
        }

        let external_id = response
            .headers()
            .get("X-Message-Id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        Ok(Delivery { external_id })
    }
}
