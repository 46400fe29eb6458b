//! Admin console: inventory, order management, drivers, analytics, events

use uuid::Uuid;

use super::accounts::{self, Origin, Registration};
use super::{found, notifications, ServiceError, ServiceResult};
use crate::models::{
    analytics::AnalyticsSummary,
    event::{CreateEvent, Event},
    notification::NotificationLog,
    order::{Order, OrderStatus, OrderWithItems},
    product::{CreateProduct, Product, UpdateProduct},
    user::{User, UserRole},
};
use crate::storage::Storage;

pub const DEFAULT_ANALYTICS_DAYS: u32 = 30;
pub const MAX_ANALYTICS_DAYS: u32 = 365;
pub const DEFAULT_NOTIFICATION_LIMIT: usize = 50;
pub const MAX_NOTIFICATION_LIMIT: usize = 500;

/// Every product, listed or not
pub async fn products(storage: &dyn Storage) -> ServiceResult<Vec<Product>> {
    Ok(storage.list_products(true).await?)
}

fn check_stock(stock: i32) -> ServiceResult<()> {
    if stock < 0 {
        return Err(ServiceError::validation("Stock quantity cannot be negative"));
    }
    Ok(())
}

pub async fn create_product(storage: &dyn Storage, mut data: CreateProduct) -> ServiceResult<Product> {
    data.name = data.name.trim().to_string();
    if data.name.is_empty() {
        return Err(ServiceError::validation("Product name is required"));
    }
    check_stock(data.stock_quantity)?;
    data.check_shape().map_err(ServiceError::Validation)?;

    let product = storage.create_product(data).await?;
    tracing::info!(product_id = %product.id, name = %product.name, "Product created");
    Ok(product)
}

/// Applies a partial update; the result must still be a well-formed product
pub async fn update_product(storage: &dyn Storage, id: Uuid, mut data: UpdateProduct) -> ServiceResult<Product> {
    if let Some(name) = data.name.as_mut() {
        *name = name.trim().to_string();
    }
    let mut preview = found(storage.get_product(id).await?, "Product")?;
    data.clone().apply(&mut preview);
    if preview.name.is_empty() {
        return Err(ServiceError::validation("Product name is required"));
    }
    check_stock(preview.stock_quantity)?;
    preview.check_shape().map_err(ServiceError::Validation)?;

    found(storage.update_product(id, data).await?, "Product")
}

pub async fn toggle_availability(storage: &dyn Storage, id: Uuid) -> ServiceResult<Product> {
    let product = found(storage.get_product(id).await?, "Product")?;
    let update = UpdateProduct {
        is_available: Some(!product.is_available),
        ..Default::default()
    };
    found(storage.update_product(id, update).await?, "Product")
}

pub async fn all_orders(storage: &dyn Storage) -> ServiceResult<Vec<OrderWithItems>> {
    Ok(storage.all_orders().await?)
}

/// Sets an order's status and notifies the customer
///
/// Completed and cancelled orders are final.
pub async fn update_order_status(
    storage: &dyn Storage,
    order_id: Uuid,
    status: OrderStatus,
) -> ServiceResult<Order> {
    let current = found(storage.get_order(order_id).await?, "Order")?.order;
    if current.status.is_terminal() {
        return Err(ServiceError::Conflict(format!("Order is already {}", current.status)));
    }

    let order = storage
        .transition_order(order_id, &OrderStatus::OPEN, status)
        .await?
        .ok_or_else(|| ServiceError::Conflict("Order was closed while updating".to_string()))?;
    tracing::info!(order_id = %order_id, from = %current.status, to = %status, "Order status changed");

    notifications::notify_order_status_change(storage, &order, status).await;
    Ok(order)
}

/// Hands an order to a driver
pub async fn assign_driver(storage: &dyn Storage, order_id: Uuid, driver_id: Uuid) -> ServiceResult<Order> {
    let driver = storage
        .get_user(driver_id)
        .await?
        .filter(|u| u.role == UserRole::Driver && u.is_active)
        .ok_or_else(|| ServiceError::validation("User is not an active driver"))?;

    let current = found(storage.get_order(order_id).await?, "Order")?.order;
    if current.status.is_terminal() {
        return Err(ServiceError::Conflict(format!(
            "Cannot assign a driver to a {} order",
            current.status
        )));
    }

    let order = storage
        .assign_driver(order_id, driver.id)
        .await?
        .ok_or_else(|| ServiceError::Conflict("Order was closed while assigning".to_string()))?;
    tracing::info!(order_id = %order_id, driver_id = %driver.id, "Driver assigned");

    notifications::notify_order_status_change(storage, &order, OrderStatus::Assigned).await;
    Ok(order)
}

pub async fn available_drivers(storage: &dyn Storage) -> ServiceResult<Vec<User>> {
    Ok(storage.available_drivers().await?)
}

pub async fn drivers(storage: &dyn Storage) -> ServiceResult<Vec<User>> {
    Ok(storage.list_users(Some(UserRole::Driver)).await?)
}

pub async fn low_stock(storage: &dyn Storage, threshold: i32) -> ServiceResult<Vec<Product>> {
    Ok(storage.low_stock_products(threshold).await?)
}

/// Clamps a requested analytics window to `1..=365` days
pub fn analytics_window(days: Option<u32>) -> u32 {
    days.unwrap_or(DEFAULT_ANALYTICS_DAYS).clamp(1, MAX_ANALYTICS_DAYS)
}

/// Daily order summaries, newest day first
pub async fn analytics(storage: &dyn Storage, days: Option<u32>) -> ServiceResult<Vec<AnalyticsSummary>> {
    Ok(storage.daily_summaries(analytics_window(days)).await?)
}

pub async fn active_events(storage: &dyn Storage) -> ServiceResult<Vec<Event>> {
    Ok(storage.active_events().await?)
}

pub async fn create_event(storage: &dyn Storage, mut data: CreateEvent) -> ServiceResult<Event> {
    data.title = data.title.trim().to_string();
    if data.title.is_empty() {
        return Err(ServiceError::validation("Event title is required"));
    }
    if let Some(end) = data.ends_at {
        if end <= data.starts_at {
            return Err(ServiceError::validation("Event must end after it starts"));
        }
    }

    Ok(storage.create_event(data).await?)
}

pub async fn recent_notifications(
    storage: &dyn Storage,
    limit: Option<usize>,
) -> ServiceResult<Vec<NotificationLog>> {
    let limit = limit
        .unwrap_or(DEFAULT_NOTIFICATION_LIMIT)
        .clamp(1, MAX_NOTIFICATION_LIMIT);
    Ok(storage.recent_notifications(limit).await?)
}

/// Creates an account of any role from the admin console
pub async fn create_staff_user(storage: &dyn Storage, reg: Registration) -> ServiceResult<User> {
    accounts::register(storage, reg, Origin::Staff).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        order::{NewOrder, NewOrderItem},
        product::{ProductType, StrainType},
        user::CreateUser,
    };
    use crate::storage::MemoryStorage;
    use chrono::{Duration, Utc};

    async fn user(storage: &MemoryStorage, email: &str, role: UserRole) -> User {
        storage
            .create_user(CreateUser {
                email: email.to_string(),
                password_hash: "x".to_string(),
                first_name: None,
                last_name: None,
                phone_number: None,
                role,
                vehicle_number: Some("MZ 42".to_string()),
                driver_license_number: None,
            })
            .await
            .unwrap()
    }

    async fn order(storage: &MemoryStorage, user_id: Uuid) -> Order {
        let product = storage.list_products(false).await.unwrap().remove(0);
        let price = product.unit_price().unwrap();
        storage
            .create_order(NewOrder {
                user_id,
                delivery_location: "Blantyre".to_string(),
                items: vec![NewOrderItem {
                    product_id: product.id,
                    product_name: product.name,
                    quantity: 1,
                    unit_price: price,
                    subtotal: price,
                }],
            })
            .await
            .unwrap()
            .order
    }

    #[test]
    fn test_analytics_window() {
        assert_eq!(analytics_window(None), 30);
        assert_eq!(analytics_window(Some(0)), 1);
        assert_eq!(analytics_window(Some(7)), 7);
        assert_eq!(analytics_window(Some(10_000)), 365);
    }

    #[tokio::test]
    async fn test_flower_needs_strain() {
        let storage = MemoryStorage::new();
        let err = create_product(
            &storage,
            CreateProduct {
                name: "Kush".to_string(),
                description: None,
                product_type: ProductType::Flower,
                strain_type: None,
                price_per_gram: Some(3000),
                size_mg: None,
                total_price: None,
                stock_quantity: 10,
                image_url: None,
                is_available: true,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let ok = create_product(
            &storage,
            CreateProduct {
                name: " Kush ".to_string(),
                description: None,
                product_type: ProductType::Flower,
                strain_type: Some(StrainType::Indica),
                price_per_gram: Some(3000),
                size_mg: None,
                total_price: None,
                stock_quantity: 10,
                image_url: None,
                is_available: true,
            },
        )
        .await
        .unwrap();
        assert_eq!(ok.name, "Kush");
    }

    #[tokio::test]
    async fn test_update_cannot_break_shape() {
        let storage = MemoryStorage::seeded();
        let product = storage.list_products(false).await.unwrap().remove(0);

        let err = update_product(
            &storage,
            product.id,
            UpdateProduct {
                stock_quantity: Some(-1),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "Stock quantity cannot be negative");

        let unchanged = storage.get_product(product.id).await.unwrap().unwrap();
        assert_eq!(unchanged.stock_quantity, product.stock_quantity);
    }

    #[tokio::test]
    async fn test_renamed_product_is_trimmed() {
        let storage = MemoryStorage::seeded();
        let product = storage.list_products(false).await.unwrap().remove(0);

        let renamed = update_product(
            &storage,
            product.id,
            UpdateProduct {
                name: Some("  Zomba Gold  ".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(renamed.name, "Zomba Gold");

        let blank = update_product(
            &storage,
            product.id,
            UpdateProduct {
                name: Some("   ".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert_eq!(blank.to_string(), "Product name is required");
        let stored = storage.get_product(product.id).await.unwrap().unwrap();
        assert_eq!(stored.name, "Zomba Gold");
    }

    #[tokio::test]
    async fn test_toggle_availability() {
        let storage = MemoryStorage::seeded();
        let product = storage.list_products(false).await.unwrap().remove(0);

        let hidden = toggle_availability(&storage, product.id).await.unwrap();
        assert!(!hidden.is_available);
        assert!(storage
            .list_products(false)
            .await
            .unwrap()
            .iter()
            .all(|p| p.id != product.id));
        assert!(toggle_availability(&storage, product.id).await.unwrap().is_available);
    }

    #[tokio::test]
    async fn test_terminal_orders_are_final() {
        let storage = MemoryStorage::seeded();
        let customer = user(&storage, "c@x.mw", UserRole::Customer).await;
        let order = order(&storage, customer.id).await;

        let cancelled = update_order_status(&storage, order.id, OrderStatus::Cancelled)
            .await
            .unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);

        let err = update_order_status(&storage, order.id, OrderStatus::Processing)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_assign_requires_active_driver() {
        let storage = MemoryStorage::seeded();
        let customer = user(&storage, "c@x.mw", UserRole::Customer).await;
        let driver = user(&storage, "d@x.mw", UserRole::Driver).await;
        let order = order(&storage, customer.id).await;

        let err = assign_driver(&storage, order.id, customer.id).await.unwrap_err();
        assert_eq!(err.to_string(), "User is not an active driver");

        let assigned = assign_driver(&storage, order.id, driver.id).await.unwrap();
        assert_eq!(assigned.status, OrderStatus::Assigned);
        assert_eq!(assigned.driver_id, Some(driver.id));
    }

    #[tokio::test]
    async fn test_event_rules() {
        let storage = MemoryStorage::new();
        let now = Utc::now();
        let event = |title: &str, end: Option<chrono::DateTime<Utc>>| CreateEvent {
            title: title.to_string(),
            description: None,
            location: Some("Mzuzu".to_string()),
            starts_at: now,
            ends_at: end,
        };

        let err = create_event(&storage, event("  ", None)).await.unwrap_err();
        assert_eq!(err.to_string(), "Event title is required");

        let err = create_event(&storage, event("Tasting", Some(now - Duration::hours(1))))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Event must end after it starts");

        create_event(&storage, event("Tasting", Some(now + Duration::hours(3))))
            .await
            .unwrap();
        assert_eq!(active_events(&storage).await.unwrap().len(), 1);
    }
}
