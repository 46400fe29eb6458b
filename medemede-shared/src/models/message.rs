//! Chat messages between customers, drivers, and support
//!
//! A message with no sender is a system message (e.g. an order status update).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::user::UserRole;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,

    pub sender_id: Option<Uuid>,

    pub receiver_id: Option<Uuid>,

    pub order_id: Option<Uuid>,

    /// Channel the message was posted to (customer, driver, or admin support)
    pub role: Option<UserRole>,

    pub content: String,

    pub is_read: bool,

    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub sender_id: Option<Uuid>,

    pub receiver_id: Option<Uuid>,

    pub order_id: Option<Uuid>,

    pub role: Option<UserRole>,

    pub content: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageFilter {
    pub order_id: Option<Uuid>,

    pub role: Option<UserRole>,
}

impl MessageFilter {
    pub fn matches(&self, message: &Message) -> bool {
        self.order_id.map_or(true, |id| message.order_id == Some(id))
            && self.role.map_or(true, |role| message.role == Some(role))
    }
}

impl Message {
    pub fn from_new(data: NewMessage) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender_id: data.sender_id,
            receiver_id: data.receiver_id,
            order_id: data.order_id,
            role: data.role,
            content: data.content,
            is_read: false,
            created_at: Utc::now(),
        }
    }

    pub async fn create(pool: &PgPool, data: NewMessage) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO messages (sender_id, receiver_id, order_id, role, content)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, sender_id, receiver_id, order_id, role, content, is_read, created_at
            "#,
        )
        .bind(data.sender_id)
        .bind(data.receiver_id)
        .bind(data.order_id)
        .bind(data.role)
        .bind(data.content)
        .fetch_one(pool)
        .await
    }

    /// Oldest first
    pub async fn list(pool: &PgPool, filter: MessageFilter) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Message>(
            r#"
            SELECT id, sender_id, receiver_id, order_id, role, content, is_read, created_at
            FROM messages
            WHERE ($1::uuid IS NULL OR order_id = $1)
              AND ($2::user_role IS NULL OR role = $2)
            ORDER BY created_at ASC
            "#,
        )
        .bind(filter.order_id)
        .bind(filter.role)
        .fetch_all(pool)
        .await
    }
}
