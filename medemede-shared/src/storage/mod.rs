//! Storage interface shared by the in-memory and Postgres backends
//!
//! Services only ever see `Arc<dyn Storage>`; both backends must behave the
//! same for every operation. Lookups return `Option`, and updates of a row
//! that does not exist return `None` rather than an error.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStorage;
pub use postgres::PgStorage;

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{
    analytics::AnalyticsSummary,
    cart::CartItem,
    event::{CreateEvent, Event},
    loyalty::LoyaltyAccount,
    message::{Message, MessageFilter, NewMessage},
    notification::{NewNotification, NotificationChannel, NotificationLog},
    order::{NewOrder, Order, OrderStatus, OrderWithItems},
    payment::{NewPayment, PaymentRecord, PaymentStatus},
    product::{CreateProduct, Product, UpdateProduct},
    tracking::{DeliveryTracking, NewTracking},
    user::{CreateUser, UpdateUser, User, UserRole},
};

/// Storage failure
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A row the operation depends on does not exist
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Unique constraint violation
    #[error("{0}")]
    Conflict(String),

    /// Checkout asked for more units than are in stock
    #[error("Insufficient stock for product {0}")]
    InsufficientStock(Uuid),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

#[async_trait]
pub trait Storage: Send + Sync {
    /// Short backend name for logs and `/health`
    fn backend(&self) -> &'static str;

    /// Connectivity check
    async fn ping(&self) -> StorageResult<()>;

    // Users

    /// # Errors
    ///
    /// `StorageError::Conflict` when the email is already registered
    /// (case-insensitive).
    async fn create_user(&self, data: CreateUser) -> StorageResult<User>;
    async fn get_user(&self, id: Uuid) -> StorageResult<Option<User>>;
    async fn get_user_by_email(&self, email: &str) -> StorageResult<Option<User>>;
    async fn update_user(&self, id: Uuid, data: UpdateUser) -> StorageResult<Option<User>>;
    async fn record_login(&self, id: Uuid) -> StorageResult<()>;
    async fn list_users(&self, role: Option<UserRole>) -> StorageResult<Vec<User>>;
    async fn update_driver_location(&self, id: Uuid, latitude: f64, longitude: f64)
        -> StorageResult<()>;
    async fn set_driver_availability(&self, id: Uuid, available: bool)
        -> StorageResult<Option<User>>;
    async fn increment_driver_deliveries(&self, id: Uuid) -> StorageResult<()>;
    async fn available_drivers(&self) -> StorageResult<Vec<User>>;

    // Products

    async fn list_products(&self, include_unavailable: bool) -> StorageResult<Vec<Product>>;
    async fn get_product(&self, id: Uuid) -> StorageResult<Option<Product>>;
    async fn create_product(&self, data: CreateProduct) -> StorageResult<Product>;
    async fn update_product(&self, id: Uuid, data: UpdateProduct)
        -> StorageResult<Option<Product>>;
    async fn low_stock_products(&self, threshold: i32) -> StorageResult<Vec<Product>>;

    // Cart

    async fn cart_items(&self, user_id: Uuid) -> StorageResult<Vec<CartItem>>;
    async fn get_cart_item(&self, id: Uuid) -> StorageResult<Option<CartItem>>;
    /// Adds to the user's line for this product, creating it if needed
    async fn add_to_cart(&self, user_id: Uuid, product_id: Uuid, quantity: i32)
        -> StorageResult<CartItem>;
    async fn update_cart_item(&self, id: Uuid, quantity: i32) -> StorageResult<Option<CartItem>>;
    async fn remove_cart_item(&self, id: Uuid) -> StorageResult<bool>;
    async fn clear_cart(&self, user_id: Uuid) -> StorageResult<()>;

    // Orders

    /// Writes the order and its items and decrements stock atomically
    ///
    /// # Errors
    ///
    /// `StorageError::InsufficientStock` leaves nothing written.
    async fn create_order(&self, data: NewOrder) -> StorageResult<OrderWithItems>;
    async fn get_order(&self, id: Uuid) -> StorageResult<Option<OrderWithItems>>;
    async fn orders_for_user(&self, user_id: Uuid) -> StorageResult<Vec<OrderWithItems>>;
    async fn orders_for_driver(&self, driver_id: Uuid) -> StorageResult<Vec<OrderWithItems>>;
    async fn all_orders(&self) -> StorageResult<Vec<OrderWithItems>>;
    async fn update_order_status(&self, id: Uuid, status: OrderStatus)
        -> StorageResult<Option<Order>>;
    /// Moves an order to `to`; `None` if its status was not one of `from`
    async fn transition_order(
        &self,
        id: Uuid,
        from: &[OrderStatus],
        to: OrderStatus,
    ) -> StorageResult<Option<Order>>;
    /// Sets the driver and moves the order to `assigned`
    ///
    /// `None` if the order is missing, completed, or cancelled.
    async fn assign_driver(&self, order_id: Uuid, driver_id: Uuid) -> StorageResult<Option<Order>>;
    /// As `assign_driver`, but also `None` when any driver already holds it
    async fn claim_order(&self, order_id: Uuid, driver_id: Uuid) -> StorageResult<Option<Order>>;

    // Tracking

    async fn record_tracking(&self, data: NewTracking) -> StorageResult<DeliveryTracking>;
    async fn latest_tracking(&self, order_id: Uuid) -> StorageResult<Option<DeliveryTracking>>;

    // Loyalty

    /// Returns an empty bronze account for users without one
    async fn get_loyalty(&self, user_id: Uuid) -> StorageResult<LoyaltyAccount>;
    async fn add_loyalty_points(&self, user_id: Uuid, points: i64, spent: i64)
        -> StorageResult<LoyaltyAccount>;

    // Payments

    async fn create_payment(&self, data: NewPayment) -> StorageResult<PaymentRecord>;
    async fn payment_by_intent(&self, intent_id: &str) -> StorageResult<Option<PaymentRecord>>;
    async fn payments_for_order(&self, order_id: Uuid) -> StorageResult<Vec<PaymentRecord>>;
    /// Moves a payment from `from` to `to`; `None` if it was not in `from`
    async fn transition_payment(
        &self,
        id: Uuid,
        from: PaymentStatus,
        to: PaymentStatus,
    ) -> StorageResult<Option<PaymentRecord>>;

    // Events

    async fn active_events(&self) -> StorageResult<Vec<Event>>;
    async fn create_event(&self, data: CreateEvent) -> StorageResult<Event>;

    // Notifications

    async fn enqueue_notification(&self, data: NewNotification) -> StorageResult<NotificationLog>;
    /// Moves up to `limit` pending rows on `channels` to `sending`, oldest first
    ///
    /// A row is never returned by two claims.
    async fn claim_pending_notifications(
        &self,
        channels: &[NotificationChannel],
        limit: usize,
    ) -> StorageResult<Vec<NotificationLog>>;
    async fn mark_notification_sent(&self, id: Uuid, external_id: Option<String>)
        -> StorageResult<()>;
    async fn mark_notification_failed(&self, id: Uuid, error: &str) -> StorageResult<()>;
    async fn recent_notifications(&self, limit: usize) -> StorageResult<Vec<NotificationLog>>;

    // Analytics

    async fn daily_summaries(&self, days: u32) -> StorageResult<Vec<AnalyticsSummary>>;

    // Messages

    async fn create_message(&self, data: NewMessage) -> StorageResult<Message>;
    async fn list_messages(&self, filter: MessageFilter) -> StorageResult<Vec<Message>>;
}
