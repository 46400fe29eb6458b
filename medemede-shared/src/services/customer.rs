//! Storefront operations: cart, checkout, order history, loyalty, tracking

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::{found, notifications, ServiceError, ServiceResult};
use crate::auth::{authorization::require_order_access, middleware::AuthContext};
use crate::models::{
    cart::{CartItem, CartLine, MAX_CART_QUANTITY},
    loyalty::LoyaltyAccount,
    order::{NewOrder, NewOrderItem, OrderStatus, OrderWithItems},
};
use crate::storage::{Storage, StorageError};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub items: Vec<CartLine>,

    /// MWK
    pub total: i64,
}

/// The caller's cart, priced at current product prices
///
/// Lines whose product has disappeared are left out of the view.
pub async fn get_cart(storage: &dyn Storage, user_id: Uuid) -> ServiceResult<Cart> {
    let mut items = Vec::new();
    for item in storage.cart_items(user_id).await? {
        match storage.get_product(item.product_id).await? {
            Some(product) => items.extend(CartLine::price(&item, product)),
            None => tracing::warn!(cart_item = %item.id, "Cart item references a missing product"),
        }
    }
    let total = items.iter().map(|line| line.subtotal).sum();
    Ok(Cart { items, total })
}

fn check_quantity(quantity: i32) -> ServiceResult<()> {
    if !(1..=MAX_CART_QUANTITY).contains(&quantity) {
        return Err(ServiceError::Validation(format!(
            "Quantity must be between 1 and {}",
            MAX_CART_QUANTITY
        )));
    }
    Ok(())
}

/// Adds `quantity` (default 1) of a product to the caller's cart
pub async fn add_to_cart(
    storage: &dyn Storage,
    user_id: Uuid,
    product_id: Uuid,
    quantity: Option<i32>,
) -> ServiceResult<CartItem> {
    let quantity = quantity.unwrap_or(1);
    check_quantity(quantity)?;

    let product = found(storage.get_product(product_id).await?, "Product")?;
    if !product.is_available {
        return Err(ServiceError::validation("Product not available"));
    }

    let in_cart = storage
        .cart_items(user_id)
        .await?
        .into_iter()
        .find(|item| item.product_id == product_id)
        .map_or(0, |item| item.quantity);
    match in_cart.checked_add(quantity) {
        Some(total) if total <= MAX_CART_QUANTITY => {}
        _ => {
            return Err(ServiceError::Validation(format!(
                "A cart can hold at most {} of a product",
                MAX_CART_QUANTITY
            )))
        }
    }

    Ok(storage.add_to_cart(user_id, product_id, quantity).await?)
}

/// Loads a cart item, hiding other users' items behind `NotFound`
async fn own_cart_item(storage: &dyn Storage, user_id: Uuid, item_id: Uuid) -> ServiceResult<CartItem> {
    storage
        .get_cart_item(item_id)
        .await?
        .filter(|item| item.user_id == user_id)
        .ok_or(ServiceError::NotFound("Cart item"))
}

pub async fn update_cart_item(
    storage: &dyn Storage,
    user_id: Uuid,
    item_id: Uuid,
    quantity: i32,
) -> ServiceResult<CartItem> {
    check_quantity(quantity)?;
    own_cart_item(storage, user_id, item_id).await?;
    found(storage.update_cart_item(item_id, quantity).await?, "Cart item")
}

pub async fn remove_from_cart(storage: &dyn Storage, user_id: Uuid, item_id: Uuid) -> ServiceResult<()> {
    own_cart_item(storage, user_id, item_id).await?;
    if !storage.remove_cart_item(item_id).await? {
        return Err(ServiceError::NotFound("Cart item"));
    }
    Ok(())
}

pub async fn clear_cart(storage: &dyn Storage, user_id: Uuid) -> ServiceResult<()> {
    Ok(storage.clear_cart(user_id).await?)
}

/// Turns the caller's cart into a `pending` order
///
/// Prices and names are snapshotted from the current products; stock is
/// decremented with the order. Products left at or below
/// `low_stock_threshold` raise an alert to the admins.
pub async fn checkout(
    storage: &dyn Storage,
    user_id: Uuid,
    delivery_location: &str,
    low_stock_threshold: i32,
) -> ServiceResult<OrderWithItems> {
    let delivery_location = delivery_location.trim();
    if delivery_location.is_empty() {
        return Err(ServiceError::validation("Delivery location is required"));
    }

    let cart = storage.cart_items(user_id).await?;
    if cart.is_empty() {
        return Err(ServiceError::validation("Cart is empty"));
    }

    let mut items = Vec::with_capacity(cart.len());
    for line in &cart {
        let product = storage
            .get_product(line.product_id)
            .await?
            .filter(|p| p.is_available)
            .ok_or_else(|| ServiceError::validation("A product in your cart is no longer available"))?;
        let unit_price = product
            .unit_price()
            .ok_or_else(|| ServiceError::validation(format!("{} has no price", product.name)))?;

        items.push(NewOrderItem {
            product_id: product.id,
            product_name: product.name,
            quantity: line.quantity,
            unit_price,
            subtotal: unit_price * i64::from(line.quantity),
        });
    }

    let new_order = NewOrder {
        user_id,
        delivery_location: delivery_location.to_string(),
        items,
    };

    let order = match storage.create_order(new_order.clone()).await {
        Ok(order) => order,
        Err(StorageError::InsufficientStock(product_id)) => {
            let name = new_order
                .items
                .iter()
                .find(|item| item.product_id == product_id)
                .map_or("a product", |item| item.product_name.as_str());
            return Err(ServiceError::validation(format!("Insufficient stock for {}", name)));
        }
        Err(e) => return Err(e.into()),
    };

    storage.clear_cart(user_id).await?;

    tracing::info!(
        order_id = %order.order.id,
        user_id = %user_id,
        total = order.order.total_amount,
        items = order.items.len(),
        "Order placed"
    );

    notifications::notify_order_status_change(storage, &order.order, OrderStatus::Pending).await;

    for item in &order.items {
        if let Some(product) = storage.get_product(item.product_id).await? {
            if product.stock_quantity <= low_stock_threshold {
                notifications::notify_low_inventory(storage, &product).await;
            }
        }
    }

    Ok(order)
}

pub async fn orders(storage: &dyn Storage, user_id: Uuid) -> ServiceResult<Vec<OrderWithItems>> {
    Ok(storage.orders_for_user(user_id).await?)
}

/// One order, visible to its owner, admins, and the drivers allowed to see it
pub async fn order(storage: &dyn Storage, auth: &AuthContext, order_id: Uuid) -> ServiceResult<OrderWithItems> {
    let order = found(storage.get_order(order_id).await?, "Order")?;
    require_order_access(auth, &order.order)?;
    Ok(order)
}

pub async fn loyalty(storage: &dyn Storage, user_id: Uuid) -> ServiceResult<LoyaltyAccount> {
    Ok(storage.get_loyalty(user_id).await?)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverSummary {
    pub id: Uuid,

    pub name: String,

    pub phone_number: Option<String>,

    pub vehicle_number: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub latitude: f64,

    pub longitude: f64,

    pub speed: Option<f64>,

    /// When the position was reported; unknown for a driver's stored position
    pub recorded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryStatus {
    pub order_id: Uuid,

    pub status: OrderStatus,

    pub delivery_location: String,

    pub driver: Option<DriverSummary>,

    pub location: Option<Location>,
}

/// Where an order is right now
pub async fn track_delivery(
    storage: &dyn Storage,
    auth: &AuthContext,
    order_id: Uuid,
) -> ServiceResult<DeliveryStatus> {
    let order = found(storage.get_order(order_id).await?, "Order")?.order;
    require_order_access(auth, &order)?;

    let driver = match order.driver_id {
        Some(id) => storage.get_user(id).await?,
        None => None,
    };

    let location = match storage.latest_tracking(order.id).await? {
        Some(ping) => Some(Location {
            latitude: ping.latitude,
            longitude: ping.longitude,
            speed: ping.speed,
            recorded_at: Some(ping.recorded_at),
        }),
        None => driver.as_ref().and_then(|d| d.position()).map(|(latitude, longitude)| Location {
            latitude,
            longitude,
            speed: None,
            recorded_at: None,
        }),
    };

    Ok(DeliveryStatus {
        order_id: order.id,
        status: order.status,
        delivery_location: order.delivery_location,
        driver: driver.map(|d| DriverSummary {
            id: d.id,
            name: d.display_name(),
            phone_number: d.phone_number,
            vehicle_number: d.vehicle_number,
        }),
        location,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        notification::NotificationChannel,
        product::Product,
        user::{CreateUser, UserRole},
    };
    use crate::storage::MemoryStorage;

    async fn setup() -> (MemoryStorage, Uuid, Vec<Product>) {
        let storage = MemoryStorage::seeded();
        let user = storage
            .create_user(CreateUser {
                email: "chikondi@example.mw".to_string(),
                password_hash: "x".to_string(),
                first_name: Some("Chikondi".to_string()),
                last_name: Some("Banda".to_string()),
                phone_number: None,
                role: UserRole::Customer,
                vehicle_number: None,
                driver_license_number: None,
            })
            .await
            .unwrap();
        let products = storage.list_products(false).await.unwrap();
        (storage, user.id, products)
    }

    #[tokio::test]
    async fn test_add_defaults_to_one_and_merges() {
        let (storage, user, products) = setup().await;
        add_to_cart(&storage, user, products[0].id, None).await.unwrap();
        let item = add_to_cart(&storage, user, products[0].id, Some(2)).await.unwrap();
        assert_eq!(item.quantity, 3);

        let cart = get_cart(&storage, user).await.unwrap();
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.total, cart.items[0].unit_price * 3);
    }

    #[tokio::test]
    async fn test_quantity_out_of_range_rejected() {
        let (storage, user, products) = setup().await;
        let err = add_to_cart(&storage, user, products[0].id, Some(0)).await.unwrap_err();
        assert_eq!(err.to_string(), "Quantity must be between 1 and 1000");

        let err = add_to_cart(&storage, user, products[0].id, Some(1001)).await.unwrap_err();
        assert_eq!(err.to_string(), "Quantity must be between 1 and 1000");

        let item = add_to_cart(&storage, user, products[0].id, None).await.unwrap();
        let err = update_cart_item(&storage, user, item.id, 0).await.unwrap_err();
        assert_eq!(err.to_string(), "Quantity must be between 1 and 1000");
    }

    #[tokio::test]
    async fn test_merged_quantity_cannot_overflow() {
        let (storage, user, products) = setup().await;
        let err = add_to_cart(&storage, user, products[0].id, Some(i32::MAX)).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        add_to_cart(&storage, user, products[0].id, Some(MAX_CART_QUANTITY)).await.unwrap();
        let err = add_to_cart(&storage, user, products[0].id, Some(1)).await.unwrap_err();
        assert_eq!(err.to_string(), "A cart can hold at most 1000 of a product");

        let cart = get_cart(&storage, user).await.unwrap();
        assert_eq!(cart.items[0].quantity, MAX_CART_QUANTITY);
        assert!(cart.total > 0);
    }

    #[tokio::test]
    async fn test_unavailable_product_rejected() {
        let (storage, user, products) = setup().await;
        storage
            .update_product(
                products[1].id,
                crate::models::product::UpdateProduct {
                    is_available: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let err = add_to_cart(&storage, user, products[1].id, None).await.unwrap_err();
        assert_eq!(err.to_string(), "Product not available");
    }

    #[tokio::test]
    async fn test_other_users_items_are_not_found() {
        let (storage, user, products) = setup().await;
        let item = add_to_cart(&storage, user, products[0].id, None).await.unwrap();

        let err = remove_from_cart(&storage, Uuid::new_v4(), item.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound("Cart item")));
        assert_eq!(storage.cart_items(user).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_checkout_empty_cart() {
        let (storage, user, _) = setup().await;
        let err = checkout(&storage, user, "Area 10", 10).await.unwrap_err();
        assert_eq!(err.to_string(), "Cart is empty");
    }

    #[tokio::test]
    async fn test_checkout_snapshots_and_clears() {
        let (storage, user, products) = setup().await;
        add_to_cart(&storage, user, products[0].id, Some(2)).await.unwrap();
        add_to_cart(&storage, user, products[3].id, Some(1)).await.unwrap();
        let cart = get_cart(&storage, user).await.unwrap();

        let order = checkout(&storage, user, "  Area 10, Lilongwe ", 0).await.unwrap();

        assert_eq!(order.order.status, OrderStatus::Pending);
        assert_eq!(order.order.delivery_location, "Area 10, Lilongwe");
        assert_eq!(order.order.total_amount, cart.total);
        assert_eq!(
            order.order.total_amount,
            order.items.iter().map(|i| i.subtotal).sum::<i64>()
        );
        assert!(storage.cart_items(user).await.unwrap().is_empty());

        let after = storage.get_product(products[0].id).await.unwrap().unwrap();
        assert_eq!(after.stock_quantity, products[0].stock_quantity - 2);
    }

    #[tokio::test]
    async fn test_checkout_over_stock_keeps_cart() {
        let (storage, user, products) = setup().await;
        let qty = products[0].stock_quantity + 1;
        add_to_cart(&storage, user, products[0].id, Some(qty)).await.unwrap();

        let err = checkout(&storage, user, "Area 10", 0).await.unwrap_err();
        assert_eq!(err.to_string(), format!("Insufficient stock for {}", products[0].name));
        assert_eq!(storage.cart_items(user).await.unwrap().len(), 1);
        assert!(orders(&storage, user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_low_stock_alerts_admins() {
        let (storage, user, products) = setup().await;
        storage
            .create_user(CreateUser {
                email: "admin@medemede.mw".to_string(),
                password_hash: "x".to_string(),
                first_name: None,
                last_name: None,
                phone_number: None,
                role: UserRole::Admin,
                vehicle_number: None,
                driver_license_number: None,
            })
            .await
            .unwrap();

        let qty = products[0].stock_quantity;
        add_to_cart(&storage, user, products[0].id, Some(qty)).await.unwrap();
        checkout(&storage, user, "Area 10", 5).await.unwrap();

        let alerts: Vec<_> = storage
            .recent_notifications(20)
            .await
            .unwrap()
            .into_iter()
            .filter(|n| n.recipient == "admin@medemede.mw")
            .collect();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].channel, NotificationChannel::Email);
        assert!(alerts[0].message.contains("0 units remaining"));
    }

    #[tokio::test]
    async fn test_tracking_without_driver() {
        let (storage, user, products) = setup().await;
        add_to_cart(&storage, user, products[0].id, None).await.unwrap();
        let order = checkout(&storage, user, "Area 10", 0).await.unwrap();

        let auth = AuthContext::new(user, UserRole::Customer);
        let status = track_delivery(&storage, &auth, order.order.id).await.unwrap();
        assert_eq!(status.status, OrderStatus::Pending);
        assert!(status.driver.is_none());
        assert!(status.location.is_none());

        let stranger = AuthContext::new(Uuid::new_v4(), UserRole::Customer);
        assert!(matches!(
            track_delivery(&storage, &stranger, order.order.id).await,
            Err(ServiceError::Forbidden(_))
        ));
    }
}
