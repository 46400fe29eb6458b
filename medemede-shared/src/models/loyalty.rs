//! Loyalty points ledger
//!
//! One row per customer. Points accrue at one per MWK paid; the tier is
//! derived from the running point balance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "loyalty_tier", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LoyaltyTier {
    Bronze,
    Silver,
    Gold,
    Platinum,
}

impl LoyaltyTier {
    pub const SILVER_POINTS: i64 = 10_000;
    pub const GOLD_POINTS: i64 = 50_000;
    pub const PLATINUM_POINTS: i64 = 150_000;

    pub fn for_points(points: i64) -> Self {
        match points {
            p if p >= Self::PLATINUM_POINTS => LoyaltyTier::Platinum,
            p if p >= Self::GOLD_POINTS => LoyaltyTier::Gold,
            p if p >= Self::SILVER_POINTS => LoyaltyTier::Silver,
            _ => LoyaltyTier::Bronze,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct LoyaltyAccount {
    pub user_id: Uuid,

    pub points: i64,

    /// Lifetime MWK paid
    pub total_spent: i64,

    pub tier: LoyaltyTier,

    pub updated_at: DateTime<Utc>,
}

impl LoyaltyAccount {
    /// The account a customer has before their first purchase
    pub fn empty(user_id: Uuid) -> Self {
        Self {
            user_id,
            points: 0,
            total_spent: 0,
            tier: LoyaltyTier::Bronze,
            updated_at: Utc::now(),
        }
    }

    /// Credits points and spend, recomputing the tier
    pub fn credit(&mut self, points: i64, spent: i64) {
        self.points += points;
        self.total_spent += spent;
        self.tier = LoyaltyTier::for_points(self.points);
        self.updated_at = Utc::now();
    }

    pub async fn find(pool: &PgPool, user_id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, LoyaltyAccount>(
            "SELECT user_id, points, total_spent, tier, updated_at FROM loyalty_accounts WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    /// Upserts the account with the credited amounts
    pub async fn add_points(
        pool: &PgPool,
        user_id: Uuid,
        points: i64,
        spent: i64,
    ) -> Result<Self, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let (new_points,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO loyalty_accounts (user_id, points, total_spent)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id) DO UPDATE SET
                points = loyalty_accounts.points + EXCLUDED.points,
                total_spent = loyalty_accounts.total_spent + EXCLUDED.total_spent,
                updated_at = NOW()
            RETURNING points
            "#,
        )
        .bind(user_id)
        .bind(points)
        .bind(spent)
        .fetch_one(&mut *tx)
        .await?;

        let account = sqlx::query_as::<_, LoyaltyAccount>(
            r#"
            UPDATE loyalty_accounts SET tier = $2
            WHERE user_id = $1
            RETURNING user_id, points, total_spent, tier, updated_at
            "#,
        )
        .bind(user_id)
        .bind(LoyaltyTier::for_points(new_points))
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(account)
    }
}
