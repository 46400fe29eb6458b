//! Orders and their line items
//!
//! Line items snapshot the product name and unit price at checkout, so later
//! catalogue edits never change what a customer was charged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Order lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "order_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Placed, awaiting payment or review
    Pending,

    /// Paid and being prepared
    Processing,

    /// A driver has taken the delivery
    Assigned,

    /// Driver is on the road
    OutForDelivery,

    /// Delivered
    Completed,

    /// Cancelled or refunded
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::Pending,
        OrderStatus::Processing,
        OrderStatus::Assigned,
        OrderStatus::OutForDelivery,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
    ];

    /// Every state an order can still leave
    pub const OPEN: [OrderStatus; 4] = [
        OrderStatus::Pending,
        OrderStatus::Processing,
        OrderStatus::Assigned,
        OrderStatus::OutForDelivery,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Assigned => "assigned",
            OrderStatus::OutForDelivery => "out_for_delivery",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// No further transitions are allowed from a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| {
                let valid: Vec<&str> = OrderStatus::ALL.iter().map(|s| s.as_str()).collect();
                format!("Invalid status. Must be one of: {}", valid.join(", "))
            })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,

    pub user_id: Uuid,

    pub driver_id: Option<Uuid>,

    pub status: OrderStatus,

    pub delivery_location: String,

    /// MWK
    pub total_amount: i64,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: Uuid,

    pub order_id: Uuid,

    pub product_id: Uuid,

    pub product_name: String,

    pub quantity: i32,

    pub unit_price: i64,

    pub subtotal: i64,
}

/// An order header with its items
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,

    pub items: Vec<OrderItem>,
}

/// Checkout output handed to storage
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: Uuid,

    pub delivery_location: String,

    pub items: Vec<NewOrderItem>,
}

impl NewOrder {
    pub fn total_amount(&self) -> i64 {
        self.items.iter().map(|item| item.subtotal).sum()
    }
}

#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_id: Uuid,

    pub product_name: String,

    pub quantity: i32,

    pub unit_price: i64,

    pub subtotal: i64,
}

/// Failure modes of the order-creation transaction
#[derive(Debug, thiserror::Error)]
pub enum CreateOrderError {
    #[error("Insufficient stock for product {0}")]
    InsufficientStock(Uuid),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

const ORDER_COLUMNS: &str = "id, user_id, driver_id, status, delivery_location, total_amount, \
     created_at, updated_at, completed_at";

const ITEM_COLUMNS: &str = "id, order_id, product_id, product_name, quantity, unit_price, subtotal";

impl Order {
    /// Creates the order, its items, and decrements stock in one transaction
    ///
    /// # Errors
    ///
    /// `CreateOrderError::InsufficientStock` rolls the whole order back when any
    /// line asks for more than is on hand.
    pub async fn create(pool: &PgPool, data: NewOrder) -> Result<OrderWithItems, CreateOrderError> {
        let mut tx = pool.begin().await?;
        let total_amount = data.total_amount();

        let query = format!(
            r#"
            INSERT INTO orders (user_id, status, delivery_location, total_amount)
            VALUES ($1, 'pending', $2, $3)
            RETURNING {ORDER_COLUMNS}
            "#
        );
        let order = sqlx::query_as::<_, Order>(&query)
            .bind(data.user_id)
            .bind(&data.delivery_location)
            .bind(total_amount)
            .fetch_one(&mut *tx)
            .await?;

        let item_query = format!(
            r#"
            INSERT INTO order_items (order_id, product_id, product_name, quantity, unit_price, subtotal)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {ITEM_COLUMNS}
            "#
        );

        let mut items = Vec::with_capacity(data.items.len());
        for item in data.items {
            let decremented = sqlx::query(
                r#"
                UPDATE products
                SET stock_quantity = stock_quantity - $2, updated_at = NOW()
                WHERE id = $1 AND stock_quantity >= $2
                "#,
            )
            .bind(item.product_id)
            .bind(item.quantity)
            .execute(&mut *tx)
            .await?;

            if decremented.rows_affected() == 0 {
                // Dropping the transaction rolls it back
                return Err(CreateOrderError::InsufficientStock(item.product_id));
            }

            let row = sqlx::query_as::<_, OrderItem>(&item_query)
                .bind(order.id)
                .bind(item.product_id)
                .bind(item.product_name)
                .bind(item.quantity)
                .bind(item.unit_price)
                .bind(item.subtotal)
                .fetch_one(&mut *tx)
                .await?;
            items.push(row);
        }

        tx.commit().await?;

        tracing::info!(order_id = %order.id, total_amount, "Order created");
        Ok(OrderWithItems { order, items })
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        sqlx::query_as::<_, Order>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC"
        );
        sqlx::query_as::<_, Order>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    pub async fn list_for_driver(pool: &PgPool, driver_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE driver_id = $1 ORDER BY created_at DESC"
        );
        sqlx::query_as::<_, Order>(&query)
            .bind(driver_id)
            .fetch_all(pool)
            .await
    }

    pub async fn list_all(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!("SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC");
        sqlx::query_as::<_, Order>(&query).fetch_all(pool).await
    }

    /// Sets the status; entering `completed` stamps `completed_at`
    pub async fn update_status(
        pool: &PgPool,
        id: Uuid,
        status: OrderStatus,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE orders SET
                status = $2,
                updated_at = NOW(),
                completed_at = CASE WHEN $2 = 'completed'::order_status THEN NOW() ELSE completed_at END
            WHERE id = $1
            RETURNING {ORDER_COLUMNS}
            "#
        );
        sqlx::query_as::<_, Order>(&query)
            .bind(id)
            .bind(status)
            .fetch_optional(pool)
            .await
    }

    /// Moves the status only when the current one is in `from`
    pub async fn transition(
        pool: &PgPool,
        id: Uuid,
        from: &[OrderStatus],
        to: OrderStatus,
    ) -> Result<Option<Self>, sqlx::Error> {
        let from: Vec<String> = from.iter().map(|s| s.as_str().to_string()).collect();
        let query = format!(
            r#"
            UPDATE orders SET
                status = $2,
                updated_at = NOW(),
                completed_at = CASE WHEN $2 = 'completed'::order_status THEN NOW() ELSE completed_at END
            WHERE id = $1 AND status::text = ANY($3)
            RETURNING {ORDER_COLUMNS}
            "#
        );
        sqlx::query_as::<_, Order>(&query)
            .bind(id)
            .bind(to)
            .bind(from)
            .fetch_optional(pool)
            .await
    }

    /// Sets the driver of an order that is not completed or cancelled
    pub async fn assign_driver(
        pool: &PgPool,
        id: Uuid,
        driver_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE orders SET driver_id = $2, status = 'assigned', updated_at = NOW()
            WHERE id = $1 AND status NOT IN ('completed', 'cancelled')
            RETURNING {ORDER_COLUMNS}
            "#
        );
        sqlx::query_as::<_, Order>(&query)
            .bind(id)
            .bind(driver_id)
            .fetch_optional(pool)
            .await
    }

    /// Like [`Order::assign_driver`], but only while nobody else holds the order
    pub async fn claim(
        pool: &PgPool,
        id: Uuid,
        driver_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE orders SET driver_id = $2, status = 'assigned', updated_at = NOW()
            WHERE id = $1
              AND driver_id IS NULL
              AND status NOT IN ('completed', 'cancelled')
            RETURNING {ORDER_COLUMNS}
            "#
        );
        sqlx::query_as::<_, Order>(&query)
            .bind(id)
            .bind(driver_id)
            .fetch_optional(pool)
            .await
    }
}

impl OrderItem {
    pub async fn list_for_order(pool: &PgPool, order_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!("SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = $1");
        sqlx::query_as::<_, OrderItem>(&query)
            .bind(order_id)
            .fetch_all(pool)
            .await
    }

    /// Loads items for many orders in one query
    pub async fn list_for_orders(
        pool: &PgPool,
        order_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<Self>>, sqlx::Error> {
        let query = format!("SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = ANY($1)");
        let rows = sqlx::query_as::<_, OrderItem>(&query)
            .bind(order_ids)
            .fetch_all(pool)
            .await?;

        let mut grouped: HashMap<Uuid, Vec<Self>> = HashMap::new();
        for row in rows {
            grouped.entry(row.order_id).or_default().push(row);
        }
        Ok(grouped)
    }
}

/// Attaches items to a list of orders, preserving order
pub async fn with_items(
    pool: &PgPool,
    orders: Vec<Order>,
) -> Result<Vec<OrderWithItems>, sqlx::Error> {
    let ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
    let mut items = OrderItem::list_for_orders(pool, &ids).await?;

    Ok(orders
        .into_iter()
        .map(|order| OrderWithItems {
            items: items.remove(&order.id).unwrap_or_default(),
            order,
        })
        .collect())
}
