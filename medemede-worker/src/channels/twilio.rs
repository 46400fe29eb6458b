//! SMS through Twilio's Messages API

use async_trait::async_trait;
use medemede_shared::models::notification::{NotificationChannel, NotificationLog};
use serde::Deserialize;

use super::{error_message, Delivery, NotificationSender, SendError, SendResult};

const TWILIO_API: &str = "https://api.twilio.com/2010-04-01";

#[derive(Debug, Clone)]
pub struct TwilioConfig {
    pub account_sid: String,

    pub auth_token: String,

    /// Sending number in E.164 form
    pub from_phone: String,
}

#[derive(Deserialize)]
struct MessageResource {
    sid: String,
}

pub struct TwilioSender {
    client: reqwest::Client,
    config: TwilioConfig,
    base_url: String,
}

impl TwilioSender {
    pub fn new(config: TwilioConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            base_url: TWILIO_API.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/Accounts/{}/Messages.json",
            self.base_url, self.config.account_sid
        )
    }

    fn form<'a>(&'a self, notification: &'a NotificationLog) -> [(&'static str, &'a str); 3] {
        [
            ("To", notification.recipient.as_str()),
            ("From", self.config.from_phone.as_str()),
            ("Body", notification.message.as_str()),
        ]
    }
}

#[async_trait]
impl NotificationSender for TwilioSender {
    fn name(&self) -> &str {
        "twilio"
    }

    fn channel(&self) -> NotificationChannel {
        NotificationChannel::Sms
    }

    async fn send(&self, notification: &NotificationLog) -> SendResult<Delivery> {
        if !notification.recipient.starts_with('+') {
            return Err(SendError::InvalidRecipient(notification.recipient.clone()));
        }

        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&self.form(notification))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SendError::Provider {
                status: status.as_u16(),
                message: error_message(response).await,
            });
        }

        let message: MessageResource = response.json().await?;
        Ok(Delivery {
            external_id: Some(message.sid),
        })
    }
}
