//! Worker configuration from environment variables

use anyhow::Context;
use medemede_shared::models::notification::NotificationChannel;
use std::env;
use std::sync::Arc;
use std::time::Duration;

use crate::channels::{
    sendgrid::DEFAULT_FROM_EMAIL, LogSender, NotificationSender, SendGridConfig, SendGridSender,
    TwilioConfig, TwilioSender,
};
use crate::dispatcher::DispatcherConfig;

/// Provider credentials for each notification channel
#[derive(Debug, Clone, Default)]
pub struct ChannelsConfig {
    pub twilio: Option<TwilioConfig>,

    pub sendgrid: Option<SendGridConfig>,

    /// Log notifications for channels with no provider instead of leaving them pending
    pub log_fallback: bool,
}

fn non_empty(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_or<T: std::str::FromStr>(name: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match non_empty(name) {
        Some(v) => v.parse().with_context(|| format!("Invalid {}", name)),
        None => Ok(default),
    }
}

impl ChannelsConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let twilio = match (
            non_empty("TWILIO_ACCOUNT_SID"),
            non_empty("TWILIO_AUTH_TOKEN"),
            non_empty("TWILIO_PHONE"),
        ) {
            (Some(account_sid), Some(auth_token), Some(from_phone)) => Some(TwilioConfig {
                account_sid,
                auth_token,
                from_phone,
            }),
            _ => None,
        };

        let sendgrid = non_empty("SENDGRID_API_KEY").map(|api_key| SendGridConfig {
            api_key,
            from_email: non_empty("SENDGRID_FROM_EMAIL")
                .unwrap_or_else(|| DEFAULT_FROM_EMAIL.to_string()),
        });

        Ok(Self {
            twilio,
            sendgrid,
            log_fallback: parse_or("NOTIFICATION_LOG_FALLBACK", false)?,
        })
    }

    /// One sender per channel that can deliver
    pub fn senders(&self) -> Vec<Arc<dyn NotificationSender>> {
        let mut senders: Vec<Arc<dyn NotificationSender>> = Vec::new();

        match &self.twilio {
            Some(config) => senders.push(Arc::new(TwilioSender::new(config.clone()))),
            None if self.log_fallback => senders.push(Arc::new(LogSender::new(NotificationChannel::Sms))),
            None => tracing::warn!("Twilio not configured, SMS notifications stay pending"),
        }

        match &self.sendgrid {
            Some(config) => senders.push(Arc::new(SendGridSender::new(config.clone()))),
            None if self.log_fallback => {
                senders.push(Arc::new(LogSender::new(NotificationChannel::Email)))
            }
            None => tracing::warn!("SendGrid not configured, email notifications stay pending"),
        }

        senders
    }
}

impl DispatcherConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = DispatcherConfig::default();
        Ok(Self {
            poll_interval: Duration::from_millis(parse_or(
                "DISPATCH_POLL_INTERVAL_MS",
                defaults.poll_interval.as_millis() as u64,
            )?),
            batch_size: parse_or("DISPATCH_BATCH_SIZE", defaults.batch_size)?,
            max_concurrent: parse_or("DISPATCH_MAX_CONCURRENT", defaults.max_concurrent)?,
            send_timeout: Duration::from_secs(parse_or(
                "DISPATCH_SEND_TIMEOUT_SECS",
                defaults.send_timeout.as_secs(),
            )?),
        })
    }
}

/// Configuration of the standalone worker binary
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,

    pub database_max_connections: u32,

    pub dispatcher: DispatcherConfig,

    pub channels: ChannelsConfig,
}

impl WorkerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = non_empty("DATABASE_URL")
            .context("DATABASE_URL is required for the notification worker")?;

        Ok(Self {
            database_url,
            database_max_connections: parse_or("DATABASE_MAX_CONNECTIONS", 5)?,
            dispatcher: DispatcherConfig::from_env()?,
            channels: ChannelsConfig::from_env()?,
        })
    }
}
