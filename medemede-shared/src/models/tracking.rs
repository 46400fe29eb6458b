//! Driver location pings attached to an order in transit

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryTracking {
    pub id: Uuid,

    pub order_id: Uuid,

    pub driver_id: Uuid,

    pub latitude: f64,

    pub longitude: f64,

    /// km/h as reported by the driver app
    pub speed: Option<f64>,

    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTracking {
    pub order_id: Uuid,

    pub driver_id: Uuid,

    pub latitude: f64,

    pub longitude: f64,

    pub speed: Option<f64>,
}

impl DeliveryTracking {
    pub fn from_new(data: NewTracking) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id: data.order_id,
            driver_id: data.driver_id,
            latitude: data.latitude,
            longitude: data.longitude,
            speed: data.speed,
            recorded_at: Utc::now(),
        }
    }

    pub async fn record(pool: &PgPool, data: NewTracking) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, DeliveryTracking>(
            r#"
            INSERT INTO delivery_tracking (order_id, driver_id, latitude, longitude, speed)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, order_id, driver_id, latitude, longitude, speed, recorded_at
            "#,
        )
        .bind(data.order_id)
        .bind(data.driver_id)
        .bind(data.latitude)
        .bind(data.longitude)
        .bind(data.speed)
        .fetch_one(pool)
        .await
    }

    /// Most recent ping for an order
    pub async fn latest_for_order(
        pool: &PgPool,
        order_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, DeliveryTracking>(
            r#"
            SELECT id, order_id, driver_id, latitude, longitude, speed, recorded_at
            FROM delivery_tracking
            WHERE order_id = $1
            ORDER BY recorded_at DESC
            LIMIT 1
            "#,
        )
        .bind(order_id)
        .fetch_optional(pool)
        .await
    }
}
