//! In-memory storage backend
//!
//! All tables sit behind one `RwLock`, so every operation is atomic with
//! respect to the others. Used for development and tests, and for single-node
//! deployments that can afford to lose data on restart.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Storage, StorageError, StorageResult};
use crate::models::{
    analytics::{self, AnalyticsSummary},
    cart::{CartItem, MAX_CART_QUANTITY},
    event::{CreateEvent, Event},
    loyalty::LoyaltyAccount,
    message::{Message, MessageFilter, NewMessage},
    notification::{NewNotification, NotificationChannel, NotificationLog, NotificationStatus},
    order::{NewOrder, Order, OrderItem, OrderStatus, OrderWithItems},
    payment::{NewPayment, PaymentRecord, PaymentStatus},
    product::{seed_catalogue, CreateProduct, Product, UpdateProduct},
    tracking::{DeliveryTracking, NewTracking},
    user::{CreateUser, UpdateUser, User, UserRole},
};

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    products: Vec<Product>,
    cart: Vec<CartItem>,
    orders: Vec<Order>,
    order_items: Vec<OrderItem>,
    tracking: Vec<DeliveryTracking>,
    loyalty: HashMap<Uuid, LoyaltyAccount>,
    payments: Vec<PaymentRecord>,
    events: Vec<Event>,
    notifications: Vec<NotificationLog>,
    messages: Vec<Message>,
}

impl Tables {
    fn with_items(&self, order: &Order) -> OrderWithItems {
        OrderWithItems {
            order: order.clone(),
            items: self
                .order_items
                .iter()
                .filter(|item| item.order_id == order.id)
                .cloned()
                .collect(),
        }
    }

    /// Orders matching `keep`, newest first
    fn orders_where(&self, keep: impl Fn(&Order) -> bool) -> Vec<OrderWithItems> {
        let mut orders: Vec<&Order> = self.orders.iter().rev().filter(|o| keep(*o)).collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        orders.into_iter().map(|o| self.with_items(o)).collect()
    }
}

pub struct MemoryStorage {
    tables: RwLock<Tables>,
}

impl MemoryStorage {
    /// Empty store
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
        }
    }

    /// Store pre-loaded with the storefront catalogue
    pub fn seeded() -> Self {
        let tables = Tables {
            products: seed_catalogue().into_iter().map(Product::from_create).collect(),
            ..Default::default()
        };
        Self {
            tables: RwLock::new(tables),
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> StorageResult<()> {
        Ok(())
    }

    async fn create_user(&self, data: CreateUser) -> StorageResult<User> {
        let mut t = self.tables.write().await;
        if t.users.iter().any(|u| u.email.eq_ignore_ascii_case(&data.email)) {
            return Err(StorageError::Conflict("Email already registered".to_string()));
        }
        let user = User::from_create(data);
        t.users.push(user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: Uuid) -> StorageResult<Option<User>> {
        let t = self.tables.read().await;
        Ok(t.users.iter().find(|u| u.id == id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> StorageResult<Option<User>> {
        let t = self.tables.read().await;
        Ok(t.users.iter().find(|u| u.email.eq_ignore_ascii_case(email)).cloned())
    }

    async fn update_user(&self, id: Uuid, data: UpdateUser) -> StorageResult<Option<User>> {
        let mut t = self.tables.write().await;
        Ok(t.users.iter_mut().find(|u| u.id == id).map(|user| {
            data.apply(user);
            user.clone()
        }))
    }

    async fn record_login(&self, id: Uuid) -> StorageResult<()> {
        let mut t = self.tables.write().await;
        if let Some(user) = t.users.iter_mut().find(|u| u.id == id) {
            user.last_login_at = Some(Utc::now());
            user.login_count += 1;
        }
        Ok(())
    }

    async fn list_users(&self, role: Option<UserRole>) -> StorageResult<Vec<User>> {
        let t = self.tables.read().await;
        let mut users: Vec<User> = t
            .users
            .iter()
            .rev()
            .filter(|u| role.map_or(true, |r| u.role == r))
            .cloned()
            .collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(users)
    }

    async fn update_driver_location(
        &self,
        id: Uuid,
        latitude: f64,
        longitude: f64,
    ) -> StorageResult<()> {
        let mut t = self.tables.write().await;
        if let Some(user) = t.users.iter_mut().find(|u| u.id == id) {
            user.current_latitude = Some(latitude);
            user.current_longitude = Some(longitude);
            user.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn set_driver_availability(
        &self,
        id: Uuid,
        available: bool,
    ) -> StorageResult<Option<User>> {
        let mut t = self.tables.write().await;
        Ok(t.users.iter_mut().find(|u| u.id == id).map(|user| {
            user.is_available_for_delivery = available;
            user.updated_at = Utc::now();
            user.clone()
        }))
    }

    async fn increment_driver_deliveries(&self, id: Uuid) -> StorageResult<()> {
        let mut t = self.tables.write().await;
        if let Some(user) = t.users.iter_mut().find(|u| u.id == id) {
            user.total_deliveries += 1;
            user.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn available_drivers(&self) -> StorageResult<Vec<User>> {
        let t = self.tables.read().await;
        let mut drivers: Vec<User> = t
            .users
            .iter()
            .filter(|u| u.role == UserRole::Driver && u.is_active && u.is_available_for_delivery)
            .cloned()
            .collect();
        drivers.sort_by(|a, b| {
            a.total_deliveries
                .cmp(&b.total_deliveries)
                .then(a.created_at.cmp(&b.created_at))
        });
        Ok(drivers)
    }

    async fn list_products(&self, include_unavailable: bool) -> StorageResult<Vec<Product>> {
        let t = self.tables.read().await;
        let mut products: Vec<Product> = t
            .products
            .iter()
            .filter(|p| include_unavailable || p.is_available)
            .cloned()
            .collect();
        products.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(products)
    }

    async fn get_product(&self, id: Uuid) -> StorageResult<Option<Product>> {
        let t = self.tables.read().await;
        Ok(t.products.iter().find(|p| p.id == id).cloned())
    }

    async fn create_product(&self, data: CreateProduct) -> StorageResult<Product> {
        let mut t = self.tables.write().await;
        let product = Product::from_create(data);
        t.products.push(product.clone());
        Ok(product)
    }

    async fn update_product(
        &self,
        id: Uuid,
        data: UpdateProduct,
    ) -> StorageResult<Option<Product>> {
        let mut t = self.tables.write().await;
        Ok(t.products.iter_mut().find(|p| p.id == id).map(|product| {
            data.apply(product);
            product.clone()
        }))
    }

    async fn low_stock_products(&self, threshold: i32) -> StorageResult<Vec<Product>> {
        let t = self.tables.read().await;
        let mut products: Vec<Product> = t
            .products
            .iter()
            .filter(|p| p.stock_quantity <= threshold)
            .cloned()
            .collect();
        products.sort_by(|a, b| {
            a.stock_quantity
                .cmp(&b.stock_quantity)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(products)
    }

    async fn cart_items(&self, user_id: Uuid) -> StorageResult<Vec<CartItem>> {
        let t = self.tables.read().await;
        Ok(t.cart.iter().filter(|c| c.user_id == user_id).cloned().collect())
    }

    async fn get_cart_item(&self, id: Uuid) -> StorageResult<Option<CartItem>> {
        let t = self.tables.read().await;
        Ok(t.cart.iter().find(|c| c.id == id).cloned())
    }

    async fn add_to_cart(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> StorageResult<CartItem> {
        let mut t = self.tables.write().await;
        if let Some(existing) = t
            .cart
            .iter_mut()
            .find(|c| c.user_id == user_id && c.product_id == product_id)
        {
            existing.quantity = existing
                .quantity
                .saturating_add(quantity)
                .min(MAX_CART_QUANTITY);
            return Ok(existing.clone());
        }
        let item = CartItem::new(user_id, product_id, quantity);
        t.cart.push(item.clone());
        Ok(item)
    }

    async fn update_cart_item(&self, id: Uuid, quantity: i32) -> StorageResult<Option<CartItem>> {
        let mut t = self.tables.write().await;
        Ok(t.cart.iter_mut().find(|c| c.id == id).map(|item| {
            item.quantity = quantity;
            item.clone()
        }))
    }

    async fn remove_cart_item(&self, id: Uuid) -> StorageResult<bool> {
        let mut t = self.tables.write().await;
        let before = t.cart.len();
        t.cart.retain(|c| c.id != id);
        Ok(t.cart.len() < before)
    }

    async fn clear_cart(&self, user_id: Uuid) -> StorageResult<()> {
        let mut t = self.tables.write().await;
        t.cart.retain(|c| c.user_id != user_id);
        Ok(())
    }

    async fn create_order(&self, data: NewOrder) -> StorageResult<OrderWithItems> {
        let mut t = self.tables.write().await;

        // Validate every line before touching stock so a failure writes nothing
        let mut wanted: HashMap<Uuid, i32> = HashMap::new();
        for item in &data.items {
            let total = wanted.entry(item.product_id).or_default();
            *total = total.saturating_add(item.quantity);
        }
        for (product_id, quantity) in &wanted {
            let product = t
                .products
                .iter()
                .find(|p| p.id == *product_id)
                .ok_or(StorageError::NotFound("Product"))?;
            if product.stock_quantity < *quantity {
                return Err(StorageError::InsufficientStock(*product_id));
            }
        }

        let now = Utc::now();
        let order = Order {
            id: Uuid::new_v4(),
            user_id: data.user_id,
            driver_id: None,
            status: OrderStatus::Pending,
            total_amount: data.total_amount(),
            delivery_location: data.delivery_location,
            created_at: now,
            updated_at: now,
            completed_at: None,
        };

        for (product_id, quantity) in wanted {
            if let Some(product) = t.products.iter_mut().find(|p| p.id == product_id) {
                product.stock_quantity -= quantity;
                product.updated_at = now;
            }
        }

        let items: Vec<OrderItem> = data
            .items
            .into_iter()
            .map(|item| OrderItem {
                id: Uuid::new_v4(),
                order_id: order.id,
                product_id: item.product_id,
                product_name: item.product_name,
                quantity: item.quantity,
                unit_price: item.unit_price,
                subtotal: item.subtotal,
            })
            .collect();

        t.orders.push(order.clone());
        t.order_items.extend(items.iter().cloned());

        Ok(OrderWithItems { order, items })
    }

    async fn get_order(&self, id: Uuid) -> StorageResult<Option<OrderWithItems>> {
        let t = self.tables.read().await;
        Ok(t.orders.iter().find(|o| o.id == id).map(|o| t.with_items(o)))
    }

    async fn orders_for_user(&self, user_id: Uuid) -> StorageResult<Vec<OrderWithItems>> {
        let t = self.tables.read().await;
        Ok(t.orders_where(|o| o.user_id == user_id))
    }

    async fn orders_for_driver(&self, driver_id: Uuid) -> StorageResult<Vec<OrderWithItems>> {
        let t = self.tables.read().await;
        Ok(t.orders_where(|o| o.driver_id == Some(driver_id)))
    }

    async fn all_orders(&self) -> StorageResult<Vec<OrderWithItems>> {
        let t = self.tables.read().await;
        Ok(t.orders_where(|_| true))
    }

    async fn update_order_status(
        &self,
        id: Uuid,
        status: OrderStatus,
    ) -> StorageResult<Option<Order>> {
        let mut t = self.tables.write().await;
        Ok(t.orders.iter_mut().find(|o| o.id == id).map(|order| {
            set_status(order, status);
            order.clone()
        }))
    }

    async fn transition_order(
        &self,
        id: Uuid,
        from: &[OrderStatus],
        to: OrderStatus,
    ) -> StorageResult<Option<Order>> {
        let mut t = self.tables.write().await;
        Ok(t.orders
            .iter_mut()
            .find(|o| o.id == id && from.contains(&o.status))
            .map(|order| {
                set_status(order, to);
                order.clone()
            }))
    }

    async fn assign_driver(&self, order_id: Uuid, driver_id: Uuid) -> StorageResult<Option<Order>> {
        let mut t = self.tables.write().await;
        Ok(t.orders
            .iter_mut()
            .find(|o| o.id == order_id && !o.status.is_terminal())
            .map(|order| {
                order.driver_id = Some(driver_id);
                set_status(order, OrderStatus::Assigned);
                order.clone()
            }))
    }

    async fn claim_order(&self, order_id: Uuid, driver_id: Uuid) -> StorageResult<Option<Order>> {
        let mut t = self.tables.write().await;
        Ok(t.orders
            .iter_mut()
            .find(|o| o.id == order_id && o.driver_id.is_none() && !o.status.is_terminal())
            .map(|order| {
                order.driver_id = Some(driver_id);
                set_status(order, OrderStatus::Assigned);
                order.clone()
            }))
    }

    async fn record_tracking(&self, data: NewTracking) -> StorageResult<DeliveryTracking> {
        let mut t = self.tables.write().await;
        let ping = DeliveryTracking::from_new(data);
        t.tracking.push(ping.clone());
        Ok(ping)
    }

    async fn latest_tracking(&self, order_id: Uuid) -> StorageResult<Option<DeliveryTracking>> {
        let t = self.tables.read().await;
        // Later pushes win ties on recorded_at
        Ok(t.tracking
            .iter()
            .filter(|p| p.order_id == order_id)
            .fold(None::<&DeliveryTracking>, |latest, ping| match latest {
                Some(l) if l.recorded_at > ping.recorded_at => Some(l),
                _ => Some(ping),
            })
            .cloned())
    }

    async fn get_loyalty(&self, user_id: Uuid) -> StorageResult<LoyaltyAccount> {
        let t = self.tables.read().await;
        Ok(t.loyalty
            .get(&user_id)
            .cloned()
            .unwrap_or_else(|| LoyaltyAccount::empty(user_id)))
    }

    async fn add_loyalty_points(
        &self,
        user_id: Uuid,
        points: i64,
        spent: i64,
    ) -> StorageResult<LoyaltyAccount> {
        let mut t = self.tables.write().await;
        let account = t
            .loyalty
            .entry(user_id)
            .or_insert_with(|| LoyaltyAccount::empty(user_id));
        account.credit(points, spent);
        Ok(account.clone())
    }

    async fn create_payment(&self, data: NewPayment) -> StorageResult<PaymentRecord> {
        let mut t = self.tables.write().await;
        if t
            .payments
            .iter()
            .any(|p| p.stripe_payment_intent_id == data.stripe_payment_intent_id)
        {
            return Err(StorageError::Conflict(
                "Payment intent already recorded".to_string(),
            ));
        }
        let record = PaymentRecord::from_new(data);
        t.payments.push(record.clone());
        Ok(record)
    }

    async fn payment_by_intent(&self, intent_id: &str) -> StorageResult<Option<PaymentRecord>> {
        let t = self.tables.read().await;
        Ok(t.payments
            .iter()
            .find(|p| p.stripe_payment_intent_id == intent_id)
            .cloned())
    }

    async fn payments_for_order(&self, order_id: Uuid) -> StorageResult<Vec<PaymentRecord>> {
        let t = self.tables.read().await;
        Ok(t.payments
            .iter()
            .rev()
            .filter(|p| p.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn transition_payment(
        &self,
        id: Uuid,
        from: PaymentStatus,
        to: PaymentStatus,
    ) -> StorageResult<Option<PaymentRecord>> {
        let mut t = self.tables.write().await;
        Ok(t.payments
            .iter_mut()
            .find(|p| p.id == id && p.status == from)
            .map(|record| {
                record.status = to;
                record.updated_at = Utc::now();
                record.clone()
            }))
    }

    async fn active_events(&self) -> StorageResult<Vec<Event>> {
        let t = self.tables.read().await;
        let now = Utc::now();
        let mut events: Vec<Event> = t.events.iter().filter(|e| e.is_current(now)).cloned().collect();
        events.sort_by(|a, b| a.starts_at.cmp(&b.starts_at));
        Ok(events)
    }

    async fn create_event(&self, data: CreateEvent) -> StorageResult<Event> {
        let mut t = self.tables.write().await;
        let event = Event::from_create(data);
        t.events.push(event.clone());
        Ok(event)
    }

    async fn enqueue_notification(&self, data: NewNotification) -> StorageResult<NotificationLog> {
        let mut t = self.tables.write().await;
        let row = NotificationLog::from_new(data);
        t.notifications.push(row.clone());
        Ok(row)
    }

    async fn claim_pending_notifications(
        &self,
        channels: &[NotificationChannel],
        limit: usize,
    ) -> StorageResult<Vec<NotificationLog>> {
        let mut t = self.tables.write().await;
        let claimed = t
            .notifications
            .iter_mut()
            .filter(|n| n.status == NotificationStatus::Pending && channels.contains(&n.channel))
            .take(limit)
            .map(|row| {
                row.status = NotificationStatus::Sending;
                row.clone()
            })
            .collect();
        Ok(claimed)
    }

    async fn mark_notification_sent(
        &self,
        id: Uuid,
        external_id: Option<String>,
    ) -> StorageResult<()> {
        let mut t = self.tables.write().await;
        if let Some(row) = t.notifications.iter_mut().find(|n| n.id == id) {
            row.status = NotificationStatus::Sent;
            row.external_id = external_id;
            row.error = None;
            row.sent_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn mark_notification_failed(&self, id: Uuid, error: &str) -> StorageResult<()> {
        let mut t = self.tables.write().await;
        if let Some(row) = t.notifications.iter_mut().find(|n| n.id == id) {
            row.status = NotificationStatus::Failed;
            row.error = Some(error.to_string());
        }
        Ok(())
    }

    async fn recent_notifications(&self, limit: usize) -> StorageResult<Vec<NotificationLog>> {
        let t = self.tables.read().await;
        Ok(t.notifications.iter().rev().take(limit).cloned().collect())
    }

    async fn daily_summaries(&self, days: u32) -> StorageResult<Vec<AnalyticsSummary>> {
        let t = self.tables.read().await;
        Ok(analytics::summarize(&t.orders, days, Utc::now()))
    }

    async fn create_message(&self, data: NewMessage) -> StorageResult<Message> {
        let mut t = self.tables.write().await;
        let message = Message::from_new(data);
        t.messages.push(message.clone());
        Ok(message)
    }

    async fn list_messages(&self, filter: MessageFilter) -> StorageResult<Vec<Message>> {
        let t = self.tables.read().await;
        Ok(t.messages.iter().filter(|m| filter.matches(m)).cloned().collect())
    }
}

/// Entering `completed` stamps `completed_at`
fn set_status(order: &mut Order, status: OrderStatus) {
    let now = Utc::now();
    order.status = status;
    order.updated_at = now;
    if status == OrderStatus::Completed {
        order.completed_at = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::order::NewOrderItem;

    fn customer(email: &str) -> CreateUser {
        CreateUser {
            email: email.to_string(),
            password_hash: "hash".to_string(),
            first_name: None,
            last_name: None,
            phone_number: None,
            role: UserRole::Customer,
            vehicle_number: None,
            driver_license_number: None,
        }
    }

    fn line(product: &Product, quantity: i32) -> NewOrderItem {
        let unit_price = product.unit_price().unwrap();
        NewOrderItem {
            product_id: product.id,
            product_name: product.name.clone(),
            quantity,
            unit_price,
            subtotal: unit_price * i64::from(quantity),
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_is_conflict() {
        let store = MemoryStorage::new();
        store.create_user(customer("a@example.com")).await.unwrap();

        let err = store.create_user(customer("A@Example.com")).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_add_to_cart_merges_same_product() {
        let store = MemoryStorage::seeded();
        let product = store.list_products(false).await.unwrap().remove(0);
        let user = Uuid::new_v4();

        let first = store.add_to_cart(user, product.id, 2).await.unwrap();
        let second = store.add_to_cart(user, product.id, 3).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.quantity, 5);
        assert_eq!(store.cart_items(user).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_add_to_cart_merge_is_capped() {
        let store = MemoryStorage::seeded();
        let product = store.list_products(false).await.unwrap().remove(0);
        let user = Uuid::new_v4();

        store.add_to_cart(user, product.id, i32::MAX).await.unwrap();
        let merged = store.add_to_cart(user, product.id, 1).await.unwrap();

        assert_eq!(merged.quantity, MAX_CART_QUANTITY);
    }

    #[tokio::test]
    async fn test_create_order_decrements_stock() {
        let store = MemoryStorage::seeded();
        let product = store.list_products(false).await.unwrap().remove(0);
        let before = product.stock_quantity;

        let order = store
            .create_order(NewOrder {
                user_id: Uuid::new_v4(),
                delivery_location: "Area 10".to_string(),
                items: vec![line(&product, 4)],
            })
            .await
            .unwrap();

        assert_eq!(order.order.status, OrderStatus::Pending);
        assert_eq!(order.items.len(), 1);
        let after = store.get_product(product.id).await.unwrap().unwrap();
        assert_eq!(after.stock_quantity, before - 4);
    }

    #[tokio::test]
    async fn test_insufficient_stock_writes_nothing() {
        let store = MemoryStorage::seeded();
        let products = store.list_products(false).await.unwrap();
        let (a, b) = (&products[0], &products[1]);

        let err = store
            .create_order(NewOrder {
                user_id: Uuid::new_v4(),
                delivery_location: "Area 10".to_string(),
                items: vec![line(a, 1), line(b, b.stock_quantity + 1)],
            })
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::InsufficientStock(id) if id == b.id));
        assert!(store.all_orders().await.unwrap().is_empty());
        let a_after = store.get_product(a.id).await.unwrap().unwrap();
        assert_eq!(a_after.stock_quantity, a.stock_quantity);
    }

    #[tokio::test]
    async fn test_claims_never_overlap() {
        let store = MemoryStorage::new();
        for i in 0..5 {
            store
                .enqueue_notification(NewNotification {
                    user_id: None,
                    order_id: None,
                    channel: if i % 2 == 0 {
                        NotificationChannel::Email
                    } else {
                        NotificationChannel::Sms
                    },
                    recipient: format!("r{}", i),
                    subject: None,
                    message: "hello".to_string(),
                })
                .await
                .unwrap();
        }

        let both = [NotificationChannel::Email, NotificationChannel::Sms];
        let first = store.claim_pending_notifications(&both, 3).await.unwrap();
        let second = store.claim_pending_notifications(&both, 3).await.unwrap();

        assert_eq!(first.len(), 3);
        assert_eq!(second.len(), 2);
        assert!(first.iter().all(|a| second.iter().all(|b| a.id != b.id)));
        assert_eq!(first[0].recipient, "r0");
    }

    #[tokio::test]
    async fn test_claim_respects_channels() {
        let store = MemoryStorage::new();
        store
            .enqueue_notification(NewNotification {
                user_id: None,
                order_id: None,
                channel: NotificationChannel::Sms,
                recipient: "+265999999999".to_string(),
                subject: None,
                message: "hi".to_string(),
            })
            .await
            .unwrap();

        let claimed = store
            .claim_pending_notifications(&[NotificationChannel::Email], 10)
            .await
            .unwrap();
        assert!(claimed.is_empty());

        let recent = store.recent_notifications(10).await.unwrap();
        assert_eq!(recent[0].status, NotificationStatus::Pending);
    }

    #[tokio::test]
    async fn test_payment_transition_applies_once() {
        let store = MemoryStorage::new();
        let record = store
            .create_payment(NewPayment {
                order_id: Uuid::new_v4(),
                user_id: Uuid::new_v4(),
                amount: 3500,
                stripe_payment_intent_id: "pi_123".to_string(),
            })
            .await
            .unwrap();

        let first = store
            .transition_payment(record.id, PaymentStatus::Pending, PaymentStatus::Succeeded)
            .await
            .unwrap();
        let second = store
            .transition_payment(record.id, PaymentStatus::Pending, PaymentStatus::Succeeded)
            .await
            .unwrap();

        assert!(first.is_some());
        assert!(second.is_none());
    }
}
