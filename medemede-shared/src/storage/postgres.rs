//! Postgres storage backend
//!
//! Thin adapter from the `Storage` trait onto the model query functions.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{Storage, StorageError, StorageResult};
use crate::db::pool;
use crate::models::{
    analytics::{self, AnalyticsSummary},
    cart::CartItem,
    event::{CreateEvent, Event},
    loyalty::LoyaltyAccount,
    message::{Message, MessageFilter, NewMessage},
    notification::{NewNotification, NotificationChannel, NotificationLog},
    order::{self, CreateOrderError, NewOrder, Order, OrderItem, OrderStatus, OrderWithItems},
    payment::{NewPayment, PaymentRecord, PaymentStatus},
    product::{CreateProduct, Product, UpdateProduct},
    tracking::{DeliveryTracking, NewTracking},
    user::{CreateUser, UpdateUser, User, UserRole},
};

#[derive(Clone)]
pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Maps unique-constraint violations to `Conflict`
fn unique_violation(err: sqlx::Error, message: &str) -> StorageError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
            StorageError::Conflict(message.to_string())
        }
        _ => StorageError::Database(err),
    }
}

#[async_trait]
impl Storage for PgStorage {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn ping(&self) -> StorageResult<()> {
        pool::health_check(&self.pool).await?;
        Ok(())
    }

    async fn create_user(&self, data: CreateUser) -> StorageResult<User> {
        User::create(&self.pool, data)
            .await
            .map_err(|e| unique_violation(e, "Email already registered"))
    }

    async fn get_user(&self, id: Uuid) -> StorageResult<Option<User>> {
        Ok(User::find_by_id(&self.pool, id).await?)
    }

    async fn get_user_by_email(&self, email: &str) -> StorageResult<Option<User>> {
        Ok(User::find_by_email(&self.pool, email).await?)
    }

    async fn update_user(&self, id: Uuid, data: UpdateUser) -> StorageResult<Option<User>> {
        Ok(User::update(&self.pool, id, data).await?)
    }

    async fn record_login(&self, id: Uuid) -> StorageResult<()> {
        User::record_login(&self.pool, id).await?;
        Ok(())
    }

    async fn list_users(&self, role: Option<UserRole>) -> StorageResult<Vec<User>> {
        Ok(User::list(&self.pool, role).await?)
    }

    async fn update_driver_location(
        &self,
        id: Uuid,
        latitude: f64,
        longitude: f64,
    ) -> StorageResult<()> {
        User::update_location(&self.pool, id, latitude, longitude).await?;
        Ok(())
    }

    async fn set_driver_availability(
        &self,
        id: Uuid,
        available: bool,
    ) -> StorageResult<Option<User>> {
        Ok(User::set_availability(&self.pool, id, available).await?)
    }

    async fn increment_driver_deliveries(&self, id: Uuid) -> StorageResult<()> {
        User::increment_deliveries(&self.pool, id).await?;
        Ok(())
    }

    async fn available_drivers(&self) -> StorageResult<Vec<User>> {
        Ok(User::available_drivers(&self.pool).await?)
    }

    async fn list_products(&self, include_unavailable: bool) -> StorageResult<Vec<Product>> {
        Ok(Product::list(&self.pool, include_unavailable).await?)
    }

    async fn get_product(&self, id: Uuid) -> StorageResult<Option<Product>> {
        Ok(Product::find_by_id(&self.pool, id).await?)
    }

    async fn create_product(&self, data: CreateProduct) -> StorageResult<Product> {
        Ok(Product::create(&self.pool, data).await?)
    }

    async fn update_product(
        &self,
        id: Uuid,
        data: UpdateProduct,
    ) -> StorageResult<Option<Product>> {
        Ok(Product::update(&self.pool, id, data).await?)
    }

    async fn low_stock_products(&self, threshold: i32) -> StorageResult<Vec<Product>> {
        Ok(Product::low_stock(&self.pool, threshold).await?)
    }

    async fn cart_items(&self, user_id: Uuid) -> StorageResult<Vec<CartItem>> {
        Ok(CartItem::list_for_user(&self.pool, user_id).await?)
    }

    async fn get_cart_item(&self, id: Uuid) -> StorageResult<Option<CartItem>> {
        Ok(CartItem::find_by_id(&self.pool, id).await?)
    }

    async fn add_to_cart(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> StorageResult<CartItem> {
        Ok(CartItem::add(&self.pool, user_id, product_id, quantity).await?)
    }

    async fn update_cart_item(&self, id: Uuid, quantity: i32) -> StorageResult<Option<CartItem>> {
        Ok(CartItem::update_quantity(&self.pool, id, quantity).await?)
    }

    async fn remove_cart_item(&self, id: Uuid) -> StorageResult<bool> {
        Ok(CartItem::delete(&self.pool, id).await?)
    }

    async fn clear_cart(&self, user_id: Uuid) -> StorageResult<()> {
        CartItem::clear(&self.pool, user_id).await?;
        Ok(())
    }

    async fn create_order(&self, data: NewOrder) -> StorageResult<OrderWithItems> {
        Order::create(&self.pool, data).await.map_err(|e| match e {
            CreateOrderError::InsufficientStock(id) => StorageError::InsufficientStock(id),
            CreateOrderError::Database(e) => StorageError::Database(e),
        })
    }

    async fn get_order(&self, id: Uuid) -> StorageResult<Option<OrderWithItems>> {
        let Some(order) = Order::find_by_id(&self.pool, id).await? else {
            return Ok(None);
        };
        let items = OrderItem::list_for_order(&self.pool, id).await?;
        Ok(Some(OrderWithItems { order, items }))
    }

    async fn orders_for_user(&self, user_id: Uuid) -> StorageResult<Vec<OrderWithItems>> {
        let orders = Order::list_for_user(&self.pool, user_id).await?;
        Ok(order::with_items(&self.pool, orders).await?)
    }

    async fn orders_for_driver(&self, driver_id: Uuid) -> StorageResult<Vec<OrderWithItems>> {
        let orders = Order::list_for_driver(&self.pool, driver_id).await?;
        Ok(order::with_items(&self.pool, orders).await?)
    }

    async fn all_orders(&self) -> StorageResult<Vec<OrderWithItems>> {
        let orders = Order::list_all(&self.pool).await?;
        Ok(order::with_items(&self.pool, orders).await?)
    }

    async fn update_order_status(
        &self,
        id: Uuid,
        status: OrderStatus,
    ) -> StorageResult<Option<Order>> {
        Ok(Order::update_status(&self.pool, id, status).await?)
    }

    async fn transition_order(
        &self,
        id: Uuid,
        from: &[OrderStatus],
        to: OrderStatus,
    ) -> StorageResult<Option<Order>> {
        Ok(Order::transition(&self.pool, id, from, to).await?)
    }

    async fn assign_driver(&self, order_id: Uuid, driver_id: Uuid) -> StorageResult<Option<Order>> {
        Ok(Order::assign_driver(&self.pool, order_id, driver_id).await?)
    }

    async fn claim_order(&self, order_id: Uuid, driver_id: Uuid) -> StorageResult<Option<Order>> {
        Ok(Order::claim(&self.pool, order_id, driver_id).await?)
    }

    async fn record_tracking(&self, data: NewTracking) -> StorageResult<DeliveryTracking> {
        Ok(DeliveryTracking::record(&self.pool, data).await?)
    }

    async fn latest_tracking(&self, order_id: Uuid) -> StorageResult<Option<DeliveryTracking>> {
        Ok(DeliveryTracking::latest_for_order(&self.pool, order_id).await?)
    }

    async fn get_loyalty(&self, user_id: Uuid) -> StorageResult<LoyaltyAccount> {
        Ok(LoyaltyAccount::find(&self.pool, user_id)
            .await?
            .unwrap_or_else(|| LoyaltyAccount::empty(user_id)))
    }

    async fn add_loyalty_points(
        &self,
        user_id: Uuid,
        points: i64,
        spent: i64,
    ) -> StorageResult<LoyaltyAccount> {
        Ok(LoyaltyAccount::add_points(&self.pool, user_id, points, spent).await?)
    }

    async fn create_payment(&self, data: NewPayment) -> StorageResult<PaymentRecord> {
        PaymentRecord::create(&self.pool, data)
            .await
            .map_err(|e| unique_violation(e, "Payment intent already recorded"))
    }

    async fn payment_by_intent(&self, intent_id: &str) -> StorageResult<Option<PaymentRecord>> {
        Ok(PaymentRecord::find_by_intent(&self.pool, intent_id).await?)
    }

    async fn payments_for_order(&self, order_id: Uuid) -> StorageResult<Vec<PaymentRecord>> {
        Ok(PaymentRecord::list_for_order(&self.pool, order_id).await?)
    }

    async fn transition_payment(
        &self,
        id: Uuid,
        from: PaymentStatus,
        to: PaymentStatus,
    ) -> StorageResult<Option<PaymentRecord>> {
        Ok(PaymentRecord::transition(&self.pool, id, from, to).await?)
    }

    async fn active_events(&self) -> StorageResult<Vec<Event>> {
        Ok(Event::list_active(&self.pool).await?)
    }

    async fn create_event(&self, data: CreateEvent) -> StorageResult<Event> {
        Ok(Event::create(&self.pool, data).await?)
    }

    async fn enqueue_notification(&self, data: NewNotification) -> StorageResult<NotificationLog> {
        Ok(NotificationLog::enqueue(&self.pool, data).await?)
    }

    async fn claim_pending_notifications(
        &self,
        channels: &[NotificationChannel],
        limit: usize,
    ) -> StorageResult<Vec<NotificationLog>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        Ok(NotificationLog::claim_pending(&self.pool, channels, limit).await?)
    }

    async fn mark_notification_sent(
        &self,
        id: Uuid,
        external_id: Option<String>,
    ) -> StorageResult<()> {
        NotificationLog::mark_sent(&self.pool, id, external_id).await?;
        Ok(())
    }

    async fn mark_notification_failed(&self, id: Uuid, error: &str) -> StorageResult<()> {
        NotificationLog::mark_failed(&self.pool, id, error).await?;
        Ok(())
    }

    async fn recent_notifications(&self, limit: usize) -> StorageResult<Vec<NotificationLog>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        Ok(NotificationLog::recent(&self.pool, limit).await?)
    }

    async fn daily_summaries(&self, days: u32) -> StorageResult<Vec<AnalyticsSummary>> {
        Ok(analytics::daily_summaries(&self.pool, days).await?)
    }

    async fn create_message(&self, data: NewMessage) -> StorageResult<Message> {
        Ok(Message::create(&self.pool, data).await?)
    }

    async fn list_messages(&self, filter: MessageFilter) -> StorageResult<Vec<Message>> {
        Ok(Message::list(&self.pool, filter).await?)
    }
}
