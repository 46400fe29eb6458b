//! Shopping cart lines
//!
//! A cart is just the set of `cart_items` rows for a user; it is emptied on
//! checkout.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::product::Product;

/// Most units of one product a cart line can hold
pub const MAX_CART_QUANTITY: i32 = 1000;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub id: Uuid,

    pub user_id: Uuid,

    pub product_id: Uuid,

    /// Grams for flower, packs for pre-rolls
    pub quantity: i32,

    pub created_at: DateTime<Utc>,
}

/// A cart item joined with its product and priced
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub id: Uuid,

    pub product_id: Uuid,

    pub quantity: i32,

    pub product: Product,

    pub unit_price: i64,

    pub subtotal: i64,
}

impl CartLine {
    /// Prices a cart item against its product
    ///
    /// Returns `None` when the product has no usable unit price.
    pub fn price(item: &CartItem, product: Product) -> Option<Self> {
        let unit_price = product.unit_price()?;
        Some(Self {
            id: item.id,
            product_id: item.product_id,
            quantity: item.quantity,
            subtotal: unit_price * i64::from(item.quantity),
            unit_price,
            product,
        })
    }
}

const CART_COLUMNS: &str = "id, user_id, product_id, quantity, created_at";

impl CartItem {
    pub fn new(user_id: Uuid, product_id: Uuid, quantity: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            product_id,
            quantity,
            created_at: Utc::now(),
        }
    }

    /// Adds a product to the cart, merging into an existing line
    pub async fn add(
        pool: &PgPool,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO cart_items (user_id, product_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, product_id)
            DO UPDATE SET quantity = LEAST(cart_items.quantity + EXCLUDED.quantity, {MAX_CART_QUANTITY})
            RETURNING {CART_COLUMNS}
            "#
        );

        sqlx::query_as::<_, CartItem>(&query)
            .bind(user_id)
            .bind(product_id)
            .bind(quantity)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {CART_COLUMNS} FROM cart_items WHERE id = $1");
        sqlx::query_as::<_, CartItem>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Cart contents in the order they were added
    pub async fn list_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {CART_COLUMNS} FROM cart_items WHERE user_id = $1 ORDER BY created_at ASC"
        );
        sqlx::query_as::<_, CartItem>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    pub async fn update_quantity(
        pool: &PgPool,
        id: Uuid,
        quantity: i32,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "UPDATE cart_items SET quantity = $2 WHERE id = $1 RETURNING {CART_COLUMNS}"
        );
        sqlx::query_as::<_, CartItem>(&query)
            .bind(id)
            .bind(quantity)
            .fetch_optional(pool)
            .await
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM cart_items WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn clear(pool: &PgPool, user_id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
            .bind(user_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::product::{seed_catalogue, Product};

    #[test]
    fn test_line_subtotal_uses_unit_price() {
        let product = Product::from_create(seed_catalogue().remove(1));
        let item = CartItem::new(Uuid::new_v4(), product.id, 7);

        let line = CartLine::price(&item, product).unwrap();
        assert_eq!(line.unit_price, 3000);
        assert_eq!(line.subtotal, 21_000);
    }

    #[test]
    fn test_line_without_price_is_none() {
        let mut product = Product::from_create(seed_catalogue().remove(0));
        product.price_per_gram = None;
        let item = CartItem::new(Uuid::new_v4(), product.id, 1);

        assert!(CartLine::price(&item, product).is_none());
    }
}
