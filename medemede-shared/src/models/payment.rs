//! Payment records mirroring Stripe payment intents

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Succeeded,
    Failed,
    Refunded,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    pub id: Uuid,

    pub order_id: Uuid,

    pub user_id: Uuid,

    /// MWK
    pub amount: i64,

    pub stripe_payment_intent_id: String,

    pub status: PaymentStatus,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub order_id: Uuid,

    pub user_id: Uuid,

    pub amount: i64,

    pub stripe_payment_intent_id: String,
}

const PAYMENT_COLUMNS: &str =
    "id, order_id, user_id, amount, stripe_payment_intent_id, status, created_at, updated_at";

impl PaymentRecord {
    pub fn from_new(data: NewPayment) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            order_id: data.order_id,
            user_id: data.user_id,
            amount: data.amount,
            stripe_payment_intent_id: data.stripe_payment_intent_id,
            status: PaymentStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    pub async fn create(pool: &PgPool, data: NewPayment) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO payments (order_id, user_id, amount, stripe_payment_intent_id)
            VALUES ($1, $2, $3, $4)
            RETURNING {PAYMENT_COLUMNS}
            "#
        );
        sqlx::query_as::<_, PaymentRecord>(&query)
            .bind(data.order_id)
            .bind(data.user_id)
            .bind(data.amount)
            .bind(data.stripe_payment_intent_id)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_intent(
        pool: &PgPool,
        intent_id: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query =
            format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE stripe_payment_intent_id = $1");
        sqlx::query_as::<_, PaymentRecord>(&query)
            .bind(intent_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list_for_order(pool: &PgPool, order_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE order_id = $1 ORDER BY created_at DESC"
        );
        sqlx::query_as::<_, PaymentRecord>(&query)
            .bind(order_id)
            .fetch_all(pool)
            .await
    }

    /// Compare-and-set on status
    ///
    /// Returns `None` when the record is missing or not in `from`, so a
    /// transition is applied at most once.
    pub async fn transition(
        pool: &PgPool,
        id: Uuid,
        from: PaymentStatus,
        to: PaymentStatus,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE payments SET status = $3, updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING {PAYMENT_COLUMNS}
            "#
        );
        sqlx::query_as::<_, PaymentRecord>(&query)
            .bind(id)
            .bind(from)
            .bind(to)
            .fetch_optional(pool)
            .await
    }
}
