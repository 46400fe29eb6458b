//! Notification log, doubling as the outbox drained by the dispatcher
//!
//! Rows are written `pending`, claimed into `sending`, and finish as `sent`
//! or `failed`. Nothing is retried.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "notification_channel", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum NotificationChannel {
    Sms,
    Email,
}

impl NotificationChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationChannel::Sms => "sms",
            NotificationChannel::Email => "email",
        }
    }
}

impl fmt::Display for NotificationChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "notification_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    Pending,
    Sending,
    Sent,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct NotificationLog {
    pub id: Uuid,

    pub user_id: Option<Uuid>,

    pub order_id: Option<Uuid>,

    pub channel: NotificationChannel,

    /// Phone number or email address
    pub recipient: String,

    pub subject: Option<String>,

    pub message: String,

    pub status: NotificationStatus,

    /// Provider message id (Twilio SID, SendGrid message id)
    pub external_id: Option<String>,

    pub error: Option<String>,

    pub created_at: DateTime<Utc>,

    pub sent_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: Option<Uuid>,

    pub order_id: Option<Uuid>,

    pub channel: NotificationChannel,

    pub recipient: String,

    pub subject: Option<String>,

    pub message: String,
}

const NOTIFICATION_COLUMNS: &str = "id, user_id, order_id, channel, recipient, subject, message, \
     status, external_id, error, created_at, sent_at";

impl NotificationLog {
    pub fn from_new(data: NewNotification) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: data.user_id,
            order_id: data.order_id,
            channel: data.channel,
            recipient: data.recipient,
            subject: data.subject,
            message: data.message,
            status: NotificationStatus::Pending,
            external_id: None,
            error: None,
            created_at: Utc::now(),
            sent_at: None,
        }
    }

    pub async fn enqueue(pool: &PgPool, data: NewNotification) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO notification_logs (user_id, order_id, channel, recipient, subject, message)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {NOTIFICATION_COLUMNS}
            "#
        );
        sqlx::query_as::<_, NotificationLog>(&query)
            .bind(data.user_id)
            .bind(data.order_id)
            .bind(data.channel)
            .bind(data.recipient)
            .bind(data.subject)
            .bind(data.message)
            .fetch_one(pool)
            .await
    }

    /// Claims up to `limit` pending rows on the given channels, oldest first
    ///
    /// `FOR UPDATE SKIP LOCKED` lets several dispatchers drain the outbox
    /// without handing the same row to two of them.
    pub async fn claim_pending(
        pool: &PgPool,
        channels: &[NotificationChannel],
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let channel_names: Vec<String> = channels.iter().map(|c| c.as_str().to_string()).collect();

        let query = r#"
            WITH claimable AS (
                SELECT id
                FROM notification_logs
                WHERE status = 'pending' AND channel::text = ANY($1)
                ORDER BY created_at ASC
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            )
            UPDATE notification_logs
            SET status = 'sending'
            FROM claimable
            WHERE notification_logs.id = claimable.id
            RETURNING notification_logs.*
            "#;

        let mut rows = sqlx::query_as::<_, NotificationLog>(query)
            .bind(channel_names)
            .bind(limit)
            .fetch_all(pool)
            .await?;

        rows.sort_by_key(|row| row.created_at);
        if !rows.is_empty() {
            tracing::debug!(count = rows.len(), "Claimed notifications");
        }
        Ok(rows)
    }

    pub async fn mark_sent(
        pool: &PgPool,
        id: Uuid,
        external_id: Option<String>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE notification_logs
            SET status = 'sent', external_id = $2, sent_at = NOW(), error = NULL
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(external_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn mark_failed(pool: &PgPool, id: Uuid, error: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE notification_logs SET status = 'failed', error = $2 WHERE id = $1",
        )
        .bind(id)
        .bind(error)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Newest first
    pub async fn recent(pool: &PgPool, limit: i64) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notification_logs ORDER BY created_at DESC LIMIT $1"
        );
        sqlx::query_as::<_, NotificationLog>(&query)
            .bind(limit)
            .fetch_all(pool)
            .await
    }
}
