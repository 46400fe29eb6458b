//! Storefront events (pop-ups, tastings, promotions)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: Uuid,

    pub title: String,

    pub description: Option<String>,

    pub location: Option<String>,

    pub starts_at: DateTime<Utc>,

    pub ends_at: Option<DateTime<Utc>>,

    pub is_active: bool,

    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEvent {
    pub title: String,

    pub description: Option<String>,

    pub location: Option<String>,

    pub starts_at: DateTime<Utc>,

    pub ends_at: Option<DateTime<Utc>>,
}

impl Event {
    pub fn from_create(data: CreateEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: data.title,
            description: data.description,
            location: data.location,
            starts_at: data.starts_at,
            ends_at: data.ends_at,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    /// Active and not yet over at `now`
    pub fn is_current(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.ends_at.map_or(true, |end| end >= now)
    }

    pub async fn create(pool: &PgPool, data: CreateEvent) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Event>(
            r#"
            INSERT INTO events (title, description, location, starts_at, ends_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, title, description, location, starts_at, ends_at, is_active, created_at
            "#,
        )
        .bind(data.title)
        .bind(data.description)
        .bind(data.location)
        .bind(data.starts_at)
        .bind(data.ends_at)
        .fetch_one(pool)
        .await
    }

    /// Current events, soonest first
    pub async fn list_active(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Event>(
            r#"
            SELECT id, title, description, location, starts_at, ends_at, is_active, created_at
            FROM events
            WHERE is_active AND (ends_at IS NULL OR ends_at >= NOW())
            ORDER BY starts_at ASC
            "#,
        )
        .fetch_all(pool)
        .await
    }
}
