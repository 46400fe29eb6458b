//! Delivery app operations

use serde::Serialize;
use uuid::Uuid;

use super::{found, notifications, ServiceError, ServiceResult};
use crate::auth::authorization::AuthzError;
use crate::models::{
    order::{Order, OrderStatus, OrderWithItems},
    tracking::NewTracking,
    user::User,
};
use crate::storage::Storage;

/// Orders assigned to the driver that are still in progress
pub async fn deliveries(storage: &dyn Storage, driver_id: Uuid) -> ServiceResult<Vec<OrderWithItems>> {
    let orders = storage.orders_for_driver(driver_id).await?;
    Ok(orders
        .into_iter()
        .filter(|o| !o.order.status.is_terminal())
        .collect())
}

/// Completed deliveries, newest first
pub async fn delivery_history(storage: &dyn Storage, driver_id: Uuid) -> ServiceResult<Vec<OrderWithItems>> {
    let orders = storage.orders_for_driver(driver_id).await?;
    Ok(orders
        .into_iter()
        .filter(|o| o.order.status == OrderStatus::Completed)
        .collect())
}

/// Paid orders nobody has picked up yet
pub async fn open_deliveries(storage: &dyn Storage) -> ServiceResult<Vec<OrderWithItems>> {
    let orders = storage.all_orders().await?;
    Ok(orders
        .into_iter()
        .filter(|o| o.order.driver_id.is_none() && o.order.status == OrderStatus::Processing)
        .collect())
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationUpdate {
    pub latitude: f64,

    pub longitude: f64,

    /// Order the ping was attached to, when the driver is out delivering
    pub tracked_order_id: Option<Uuid>,
}

fn check_coordinates(latitude: f64, longitude: f64, speed: Option<f64>) -> ServiceResult<()> {
    if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
        return Err(ServiceError::validation("Latitude must be between -90 and 90"));
    }
    if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
        return Err(ServiceError::validation("Longitude must be between -180 and 180"));
    }
    if let Some(speed) = speed {
        if !speed.is_finite() || speed < 0.0 {
            return Err(ServiceError::validation("Speed cannot be negative"));
        }
    }
    Ok(())
}

/// Stores the driver's position and pings the order they are delivering
pub async fn update_location(
    storage: &dyn Storage,
    driver_id: Uuid,
    latitude: f64,
    longitude: f64,
    speed: Option<f64>,
) -> ServiceResult<LocationUpdate> {
    check_coordinates(latitude, longitude, speed)?;

    storage.update_driver_location(driver_id, latitude, longitude).await?;

    let active = storage
        .orders_for_driver(driver_id)
        .await?
        .into_iter()
        .find(|o| o.order.status == OrderStatus::OutForDelivery);

    let tracked_order_id = match active {
        Some(o) => {
            storage
                .record_tracking(NewTracking {
                    order_id: o.order.id,
                    driver_id,
                    latitude,
                    longitude,
                    speed,
                })
                .await?;
            Some(o.order.id)
        }
        None => None,
    };

    tracing::debug!(driver_id = %driver_id, ?tracked_order_id, "Driver location updated");
    Ok(LocationUpdate {
        latitude,
        longitude,
        tracked_order_id,
    })
}

/// Claims an order for the driver
///
/// Re-accepting an order the driver already holds is a no-op.
pub async fn accept_delivery(storage: &dyn Storage, driver_id: Uuid, order_id: Uuid) -> ServiceResult<Order> {
    let order = found(storage.get_order(order_id).await?, "Order")?.order;

    if order.status.is_terminal() {
        return Err(ServiceError::Conflict(format!("Order is already {}", order.status)));
    }
    match order.driver_id {
        Some(holder) if holder == driver_id => return Ok(order),
        Some(_) => {
            return Err(ServiceError::Conflict(
                "Order is already assigned to another driver".to_string(),
            ))
        }
        None => {}
    }

    let order = match storage.claim_order(order_id, driver_id).await? {
        Some(order) => order,
        // Lost a race with another accept or a status change
        None => {
            let current = found(storage.get_order(order_id).await?, "Order")?.order;
            if current.driver_id == Some(driver_id) && !current.status.is_terminal() {
                return Ok(current);
            }
            return Err(ServiceError::Conflict(
                "Order is already assigned to another driver".to_string(),
            ));
        }
    };
    tracing::info!(order_id = %order_id, driver_id = %driver_id, "Delivery accepted");

    notifications::notify_order_status_change(storage, &order, OrderStatus::Assigned).await;
    Ok(order)
}

/// Loads an order that must be assigned to `driver_id`
async fn held_order(storage: &dyn Storage, driver_id: Uuid, order_id: Uuid) -> ServiceResult<Order> {
    let order = found(storage.get_order(order_id).await?, "Order")?.order;
    if order.driver_id != Some(driver_id) {
        return Err(AuthzError::NotAuthorized.into());
    }
    Ok(order)
}

pub async fn start_delivery(storage: &dyn Storage, driver_id: Uuid, order_id: Uuid) -> ServiceResult<Order> {
    let order = held_order(storage, driver_id, order_id).await?;
    if order.status != OrderStatus::Assigned {
        return Err(ServiceError::Conflict(format!(
            "Cannot start a delivery that is {}",
            order.status
        )));
    }

    let order = storage
        .transition_order(order_id, &[OrderStatus::Assigned], OrderStatus::OutForDelivery)
        .await?
        .ok_or_else(|| ServiceError::Conflict("Delivery was already started".to_string()))?;
    tracing::info!(order_id = %order_id, driver_id = %driver_id, "Delivery started");

    notifications::notify_order_status_change(storage, &order, OrderStatus::OutForDelivery).await;
    Ok(order)
}

pub async fn complete_delivery(storage: &dyn Storage, driver_id: Uuid, order_id: Uuid) -> ServiceResult<Order> {
    let order = held_order(storage, driver_id, order_id).await?;
    if !matches!(order.status, OrderStatus::Assigned | OrderStatus::OutForDelivery) {
        return Err(ServiceError::Conflict(format!(
            "Cannot complete a delivery that is {}",
            order.status
        )));
    }

    let order = storage
        .transition_order(
            order_id,
            &[OrderStatus::Assigned, OrderStatus::OutForDelivery],
            OrderStatus::Completed,
        )
        .await?
        .ok_or_else(|| ServiceError::Conflict("Delivery was already completed".to_string()))?;
    storage.increment_driver_deliveries(driver_id).await?;
    tracing::info!(order_id = %order_id, driver_id = %driver_id, "Delivery completed");

    notifications::notify_order_status_change(storage, &order, OrderStatus::Completed).await;
    Ok(order)
}

pub async fn set_availability(storage: &dyn Storage, driver_id: Uuid, available: bool) -> ServiceResult<User> {
    found(storage.set_driver_availability(driver_id, available).await?, "Driver")
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverStats {
    pub total_deliveries: i32,

    /// `None` until the driver has been rated
    pub average_rating: Option<f64>,

    pub is_available: bool,

    pub active_deliveries: usize,
}

pub async fn stats(storage: &dyn Storage, driver_id: Uuid) -> ServiceResult<DriverStats> {
    let driver = found(storage.get_user(driver_id).await?, "Driver")?;
    let active = deliveries(storage, driver_id).await?.len();

    Ok(DriverStats {
        total_deliveries: driver.total_deliveries,
        average_rating: (driver.average_rating > 0.0).then_some(driver.average_rating),
        is_available: driver.is_available_for_delivery,
        active_deliveries: active,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::middleware::AuthContext;
    use crate::models::{
        order::{NewOrder, NewOrderItem},
        user::{CreateUser, UserRole},
    };
    use crate::services::customer;
    use crate::storage::MemoryStorage;

    struct Fixture {
        storage: MemoryStorage,
        customer: Uuid,
        driver: Uuid,
        other_driver: Uuid,
        order: Uuid,
    }

    async fn account(storage: &MemoryStorage, email: &str, role: UserRole) -> Uuid {
        storage
            .create_user(CreateUser {
                email: email.to_string(),
                password_hash: "x".to_string(),
                first_name: Some("Kondwani".to_string()),
                last_name: None,
                phone_number: None,
                role,
                vehicle_number: Some("BT 9090".to_string()),
                driver_license_number: None,
            })
            .await
            .unwrap()
            .id
    }

    async fn fixture() -> Fixture {
        let storage = MemoryStorage::seeded();
        let customer = account(&storage, "c@x.mw", UserRole::Customer).await;
        let driver = account(&storage, "d1@x.mw", UserRole::Driver).await;
        let other_driver = account(&storage, "d2@x.mw", UserRole::Driver).await;

        let product = storage.list_products(false).await.unwrap().remove(0);
        let price = product.unit_price().unwrap();
        let order = storage
            .create_order(NewOrder {
                user_id: customer,
                delivery_location: "Zomba".to_string(),
                items: vec![NewOrderItem {
                    product_id: product.id,
                    product_name: product.name,
                    quantity: 2,
                    unit_price: price,
                    subtotal: price * 2,
                }],
            })
            .await
            .unwrap()
            .order
            .id;

        Fixture {
            storage,
            customer,
            driver,
            other_driver,
            order,
        }
    }

    #[tokio::test]
    async fn test_accept_held_by_other_driver_conflicts() {
        let f = fixture().await;
        accept_delivery(&f.storage, f.driver, f.order).await.unwrap();

        let err = accept_delivery(&f.storage, f.other_driver, f.order).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        let again = accept_delivery(&f.storage, f.driver, f.order).await.unwrap();
        assert_eq!(again.driver_id, Some(f.driver));
    }

    #[tokio::test]
    async fn test_simultaneous_accepts_have_one_winner() {
        let f = fixture().await;
        let (a, b) = tokio::join!(
            accept_delivery(&f.storage, f.driver, f.order),
            accept_delivery(&f.storage, f.other_driver, f.order),
        );

        let (winner, loser) = match (a, b) {
            (Ok(order), Err(err)) | (Err(err), Ok(order)) => (order, err),
            other => panic!("expected exactly one accept to succeed: {:?}", other),
        };
        assert!(matches!(loser, ServiceError::Conflict(_)));

        let stored = f.storage.get_order(f.order).await.unwrap().unwrap().order;
        assert_eq!(stored.driver_id, winner.driver_id);
    }

    #[tokio::test]
    async fn test_claim_refuses_held_or_closed_orders() {
        let f = fixture().await;
        assert!(f.storage.claim_order(f.order, f.driver).await.unwrap().is_some());
        assert!(f.storage.claim_order(f.order, f.other_driver).await.unwrap().is_none());

        let err = accept_delivery(&f.storage, f.other_driver, f.order).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        f.storage
            .update_order_status(f.order, OrderStatus::Cancelled)
            .await
            .unwrap();
        assert!(f.storage.assign_driver(f.order, f.other_driver).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_simultaneous_completions_count_once() {
        let f = fixture().await;
        accept_delivery(&f.storage, f.driver, f.order).await.unwrap();

        let (a, b) = tokio::join!(
            complete_delivery(&f.storage, f.driver, f.order),
            complete_delivery(&f.storage, f.driver, f.order),
        );
        assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);

        let stats = stats(&f.storage, f.driver).await.unwrap();
        assert_eq!(stats.total_deliveries, 1);
    }

    #[tokio::test]
    async fn test_full_delivery_flow() {
        let f = fixture().await;
        accept_delivery(&f.storage, f.driver, f.order).await.unwrap();

        let err = start_delivery(&f.storage, f.other_driver, f.order).await.unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        let started = start_delivery(&f.storage, f.driver, f.order).await.unwrap();
        assert_eq!(started.status, OrderStatus::OutForDelivery);

        let ping = update_location(&f.storage, f.driver, -15.78, 35.0, Some(32.5))
            .await
            .unwrap();
        assert_eq!(ping.tracked_order_id, Some(f.order));

        let auth = AuthContext::new(f.customer, UserRole::Customer);
        let tracking = customer::track_delivery(&f.storage, &auth, f.order).await.unwrap();
        let location = tracking.location.unwrap();
        assert_eq!(location.latitude, -15.78);
        assert_eq!(location.speed, Some(32.5));
        assert!(tracking.driver.is_some());

        let done = complete_delivery(&f.storage, f.driver, f.order).await.unwrap();
        assert_eq!(done.status, OrderStatus::Completed);
        assert!(done.completed_at.is_some());

        let stats = stats(&f.storage, f.driver).await.unwrap();
        assert_eq!(stats.total_deliveries, 1);
        assert_eq!(stats.active_deliveries, 0);
        assert_eq!(delivery_history(&f.storage, f.driver).await.unwrap().len(), 1);

        let err = complete_delivery(&f.storage, f.driver, f.order).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_location_without_active_delivery() {
        let f = fixture().await;
        let update = update_location(&f.storage, f.driver, 0.0, 0.0, None).await.unwrap();
        assert!(update.tracked_order_id.is_none());

        let driver = f.storage.get_user(f.driver).await.unwrap().unwrap();
        assert_eq!(driver.position(), Some((0.0, 0.0)));
    }

    #[tokio::test]
    async fn test_location_ranges() {
        let f = fixture().await;
        assert!(update_location(&f.storage, f.driver, 91.0, 0.0, None).await.is_err());
        assert!(update_location(&f.storage, f.driver, 0.0, -181.0, None).await.is_err());
        assert!(update_location(&f.storage, f.driver, 0.0, 0.0, Some(-1.0)).await.is_err());
        assert!(update_location(&f.storage, f.driver, f64::NAN, 0.0, None).await.is_err());
    }

    #[tokio::test]
    async fn test_tracking_falls_back_to_driver_position() {
        let f = fixture().await;
        accept_delivery(&f.storage, f.driver, f.order).await.unwrap();
        update_location(&f.storage, f.driver, -13.96, 33.78, None).await.unwrap();

        let auth = AuthContext::new(f.customer, UserRole::Customer);
        let tracking = customer::track_delivery(&f.storage, &auth, f.order).await.unwrap();
        let location = tracking.location.unwrap();
        assert_eq!((location.latitude, location.longitude), (-13.96, 33.78));
        assert!(location.recorded_at.is_none());
    }

    #[tokio::test]
    async fn test_open_deliveries() {
        let f = fixture().await;
        assert!(open_deliveries(&f.storage).await.unwrap().is_empty());

        f.storage
            .update_order_status(f.order, OrderStatus::Processing)
            .await
            .unwrap();
        assert_eq!(open_deliveries(&f.storage).await.unwrap().len(), 1);

        accept_delivery(&f.storage, f.driver, f.order).await.unwrap();
        assert!(open_deliveries(&f.storage).await.unwrap().is_empty());
    }
}
