/// End-to-end service flows on the in-memory store
///
/// Covers the path a real order takes: registration, cart, checkout,
/// payment, assignment, delivery, and the notifications along the way.

use medemede_shared::auth::middleware::AuthContext;
use medemede_shared::models::notification::{NotificationChannel, NotificationStatus};
use medemede_shared::models::order::OrderStatus;
use medemede_shared::models::user::UserRole;
use medemede_shared::services::accounts::{self, Origin, Registration};
use medemede_shared::services::payments::{self, MockGateway};
use medemede_shared::services::{admin, customer, driver, ServiceError};
use medemede_shared::storage::{MemoryStorage, Storage};

fn registration(email: &str, role: UserRole) -> Registration {
    Registration {
        email: email.to_string(),
        password: "mwk12345678".to_string(),
        first_name: Some("Test".to_string()),
        last_name: Some("User".to_string()),
        phone_number: Some("+265991000000".to_string()),
        role,
        vehicle_number: (role == UserRole::Driver).then(|| "LL 4567".to_string()),
        driver_license_number: None,
    }
}

#[tokio::test]
async fn test_order_lifecycle() {
    let storage = MemoryStorage::seeded();

    let shopper = accounts::register(&storage, registration("shopper@test.mw", UserRole::Customer), Origin::SelfService)
        .await
        .unwrap();
    let courier = accounts::register(&storage, registration("courier@test.mw", UserRole::Driver), Origin::SelfService)
        .await
        .unwrap();
    accounts::ensure_admin(&storage, "admin@test.mw", "adminpass123").await.unwrap();

    let catalogue = storage.list_products(false).await.unwrap();
    let flower = catalogue.iter().find(|p| p.price_per_gram.is_some()).unwrap();
    let preroll = catalogue.iter().find(|p| p.total_price.is_some()).unwrap();

    customer::add_to_cart(&storage, shopper.id, flower.id, Some(3)).await.unwrap();
    customer::add_to_cart(&storage, shopper.id, preroll.id, None).await.unwrap();

    let order = customer::checkout(&storage, shopper.id, "Area 18, Lilongwe", 5)
        .await
        .unwrap();
    let expected = flower.price_per_gram.unwrap() * 3 + preroll.total_price.unwrap();
    assert_eq!(order.order.total_amount, expected);
    let order_id = order.order.id;

    let intent = payments::create_intent(&storage, &MockGateway, shopper.id, order_id)
        .await
        .unwrap();
    payments::confirm(&storage, &MockGateway, shopper.id, &intent.payment_intent_id, order_id)
        .await
        .unwrap();
    assert_eq!(
        customer::loyalty(&storage, shopper.id).await.unwrap().points,
        expected
    );

    let open = driver::open_deliveries(&storage).await.unwrap();
    assert_eq!(open.len(), 1);

    admin::assign_driver(&storage, order_id, courier.id).await.unwrap();
    driver::start_delivery(&storage, courier.id, order_id).await.unwrap();
    driver::update_location(&storage, courier.id, -13.98, 33.77, Some(20.0))
        .await
        .unwrap();

    let auth = AuthContext::new(shopper.id, UserRole::Customer);
    let tracking = customer::track_delivery(&storage, &auth, order_id).await.unwrap();
    assert_eq!(tracking.status, OrderStatus::OutForDelivery);
    assert!(tracking.location.is_some());
    assert_eq!(
        tracking.driver.and_then(|d| d.vehicle_number).as_deref(),
        Some("LL 4567")
    );

    let done = driver::complete_delivery(&storage, courier.id, order_id).await.unwrap();
    assert_eq!(done.status, OrderStatus::Completed);

    let err = admin::update_order_status(&storage, order_id, OrderStatus::Cancelled)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Conflict(_)));

    // pending, processing, assigned, out_for_delivery, completed: SMS + email each
    let notes = storage.recent_notifications(100).await.unwrap();
    let to_shopper: Vec<_> = notes
        .iter()
        .filter(|n| n.user_id == Some(shopper.id))
        .collect();
    assert_eq!(to_shopper.len(), 10);
    assert!(to_shopper.iter().all(|n| n.status == NotificationStatus::Pending));
    assert_eq!(
        to_shopper
            .iter()
            .filter(|n| n.channel == NotificationChannel::Sms)
            .count(),
        5
    );
}

#[tokio::test]
async fn test_analytics_counts_today() {
    let storage = MemoryStorage::seeded();
    let shopper = accounts::register(&storage, registration("a@test.mw", UserRole::Customer), Origin::SelfService)
        .await
        .unwrap();
    let product = storage.list_products(false).await.unwrap().remove(0);

    for _ in 0..2 {
        customer::add_to_cart(&storage, shopper.id, product.id, Some(1)).await.unwrap();
        customer::checkout(&storage, shopper.id, "Mzuzu", 0).await.unwrap();
    }
    let orders = customer::orders(&storage, shopper.id).await.unwrap();
    admin::update_order_status(&storage, orders[0].order.id, OrderStatus::Cancelled)
        .await
        .unwrap();

    let summaries = admin::analytics(&storage, None).await.unwrap();
    assert_eq!(summaries.len(), 1);
    let today = &summaries[0];
    assert_eq!(today.total_orders, 2);
    assert_eq!(today.cancelled_orders, 1);
    assert_eq!(today.revenue, product.unit_price().unwrap());
}
