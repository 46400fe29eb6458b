//! Customer and admin notifications
//!
//! Nothing here talks to Twilio or SendGrid. Notifications are written to the
//! log as `pending` and the dispatcher delivers them. Every function is
//! fire-and-forget: failures are logged and never reach the caller.

use crate::models::{
    message::NewMessage,
    notification::{NewNotification, NotificationChannel},
    order::{Order, OrderStatus},
    product::Product,
    user::UserRole,
};
use crate::storage::{Storage, StorageResult};

/// Customer-facing text for an order status
pub fn status_message(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::Pending => "Your order has been received and is being processed.",
        OrderStatus::Processing => "Your order is being prepared for delivery.",
        OrderStatus::Assigned => "A driver has been assigned to your delivery.",
        OrderStatus::OutForDelivery => "Your order is on the way!",
        OrderStatus::Completed => "Your order has been delivered. Thank you for your purchase!",
        OrderStatus::Cancelled => "Your order has been cancelled.",
    }
}

pub fn status_subject(status: OrderStatus) -> String {
    format!("Order Update - Status: {}", status)
}

/// Tells the customer their order moved to `status`
///
/// Posts a system chat message on the order, then queues an SMS when the
/// customer has a phone number and an email to their address.
pub async fn notify_order_status_change(storage: &dyn Storage, order: &Order, status: OrderStatus) {
    if let Err(e) = status_change(storage, order, status).await {
        tracing::error!(
            order_id = %order.id,
            status = %status,
            error = %e,
            "Failed to queue order status notification"
        );
    }
}

async fn status_change(storage: &dyn Storage, order: &Order, status: OrderStatus) -> StorageResult<()> {
    let message = status_message(status);

    let chat = storage
        .create_message(NewMessage {
            sender_id: None,
            receiver_id: Some(order.user_id),
            order_id: Some(order.id),
            role: Some(UserRole::Customer),
            content: message.to_string(),
        })
        .await;
    if let Err(e) = chat {
        tracing::warn!(order_id = %order.id, error = %e, "Failed to post system chat message");
    }

    let Some(customer) = storage.get_user(order.user_id).await? else {
        tracing::warn!(order_id = %order.id, "Order customer no longer exists");
        return Ok(());
    };

    if let Some(phone) = customer.phone_number.as_deref().filter(|p| !p.trim().is_empty()) {
        storage
            .enqueue_notification(NewNotification {
                user_id: Some(customer.id),
                order_id: Some(order.id),
                channel: NotificationChannel::Sms,
                recipient: phone.to_string(),
                subject: None,
                message: message.to_string(),
            })
            .await?;
    }

    if !customer.email.trim().is_empty() {
        storage
            .enqueue_notification(NewNotification {
                user_id: Some(customer.id),
                order_id: Some(order.id),
                channel: NotificationChannel::Email,
                recipient: customer.email.clone(),
                subject: Some(status_subject(status)),
                message: message.to_string(),
            })
            .await?;
    }

    tracing::debug!(order_id = %order.id, status = %status, "Queued status notifications");
    Ok(())
}

/// Emails every active admin that `product` is running low
pub async fn notify_low_inventory(storage: &dyn Storage, product: &Product) {
    if let Err(e) = low_inventory(storage, product).await {
        tracing::error!(product_id = %product.id, error = %e, "Failed to queue low inventory alert");
    }
}

async fn low_inventory(storage: &dyn Storage, product: &Product) -> StorageResult<()> {
    let message = format!(
        "Low inventory alert: {} is running low ({} units remaining).",
        product.name, product.stock_quantity
    );
    let subject = format!("Low Inventory Alert: {}", product.name);

    let admins = storage.list_users(Some(UserRole::Admin)).await?;
    for admin in admins.into_iter().filter(|a| a.is_active) {
        storage
            .enqueue_notification(NewNotification {
                user_id: Some(admin.id),
                order_id: None,
                channel: NotificationChannel::Email,
                recipient: admin.email,
                subject: Some(subject.clone()),
                message: message.clone(),
            })
            .await?;
    }

    tracing::info!(
        product_id = %product.id,
        stock = product.stock_quantity,
        "Queued low inventory alert"
    );
    Ok(())
}
