//! Card payments through Stripe payment intents
//!
//! The amount charged always comes from the stored order total. A payment
//! record moves `pending -> succeeded -> refunded` (or `pending -> failed`),
//! and each move is a compare-and-set so repeated confirmations are harmless.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{found, notifications, ServiceError, ServiceResult};
use crate::auth::authorization::AuthzError;
use crate::models::{
    order::OrderStatus,
    payment::{NewPayment, PaymentRecord, PaymentStatus},
};
use crate::storage::Storage;

const STRIPE_API: &str = "https://api.stripe.com/v1";
const CURRENCY: &str = "mwk";

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("Payment provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Payment provider error ({status}): {message}")]
    Provider { status: u16, message: String },
}

/// The parts of a Stripe payment intent this service reads
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,

    pub client_secret: Option<String>,

    /// Stripe intent status, e.g. `requires_payment_method`, `succeeded`, `canceled`
    pub status: String,

    /// Minor units
    #[serde(default)]
    pub amount: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Refund {
    pub id: String,

    pub status: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Creates an intent for `amount` MWK
    async fn create_intent(
        &self,
        amount: i64,
        order_id: Uuid,
        receipt_email: &str,
    ) -> Result<PaymentIntent, PaymentError>;

    async fn retrieve_intent(&self, intent_id: &str) -> Result<PaymentIntent, PaymentError>;

    async fn refund(&self, intent_id: &str) -> Result<Refund, PaymentError>;
}

/// Stripe REST client (form-encoded requests, secret key as basic auth)
#[derive(Clone)]
pub struct StripeGateway {
    client: reqwest::Client,
    secret_key: String,
    base_url: String,
}

#[derive(Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Deserialize)]
struct StripeErrorDetail {
    message: Option<String>,
}

impl StripeGateway {
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            secret_key: secret_key.into(),
            base_url: STRIPE_API.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn handle<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, PaymentError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let message = response
            .json::<StripeErrorBody>()
            .await
            .ok()
            .and_then(|body| body.error.message)
            .unwrap_or_else(|| status.to_string());
        Err(PaymentError::Provider {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_intent(
        &self,
        amount: i64,
        order_id: Uuid,
        receipt_email: &str,
    ) -> Result<PaymentIntent, PaymentError> {
        let form = [
            ("amount", (amount * 100).to_string()),
            ("currency", CURRENCY.to_string()),
            ("metadata[orderId]", order_id.to_string()),
            ("receipt_email", receipt_email.to_string()),
        ];
        let response = self
            .client
            .post(format!("{}/payment_intents", self.base_url))
            .basic_auth(&self.secret_key, None::<&str>)
            .form(&form)
            .send()
            .await?;
        self.handle(response).await
    }

    async fn retrieve_intent(&self, intent_id: &str) -> Result<PaymentIntent, PaymentError> {
        let response = self
            .client
            .get(format!("{}/payment_intents/{}", self.base_url, intent_id))
            .basic_auth(&self.secret_key, None::<&str>)
            .send()
            .await?;
        self.handle(response).await
    }

    async fn refund(&self, intent_id: &str) -> Result<Refund, PaymentError> {
        let response = self
            .client
            .post(format!("{}/refunds", self.base_url))
            .basic_auth(&self.secret_key, None::<&str>)
            .form(&[("payment_intent", intent_id)])
            .send()
            .await?;
        self.handle(response).await
    }
}

/// Development gateway used when no Stripe key is configured
///
/// Every intent it hands back reports `succeeded` on retrieval.
#[derive(Debug, Clone, Default)]
pub struct MockGateway;

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_intent(
        &self,
        amount: i64,
        _order_id: Uuid,
        _receipt_email: &str,
    ) -> Result<PaymentIntent, PaymentError> {
        let id = format!("pi_mock_{}", Uuid::new_v4().simple());
        Ok(PaymentIntent {
            client_secret: Some(format!("{}_secret_mock", id)),
            id,
            status: "requires_payment_method".to_string(),
            amount: amount * 100,
        })
    }

    async fn retrieve_intent(&self, intent_id: &str) -> Result<PaymentIntent, PaymentError> {
        Ok(PaymentIntent {
            id: intent_id.to_string(),
            client_secret: None,
            status: "succeeded".to_string(),
            amount: 0,
        })
    }

    async fn refund(&self, _intent_id: &str) -> Result<Refund, PaymentError> {
        Ok(Refund {
            id: format!("re_mock_{}", Uuid::new_v4().simple()),
            status: "succeeded".to_string(),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedIntent {
    pub client_secret: Option<String>,

    pub payment_intent_id: String,

    /// MWK
    pub amount: i64,
}

/// Starts payment for one of the caller's pending orders
pub async fn create_intent(
    storage: &dyn Storage,
    gateway: &dyn PaymentGateway,
    user_id: Uuid,
    order_id: Uuid,
) -> ServiceResult<CreatedIntent> {
    let order = found(storage.get_order(order_id).await?, "Order")?.order;
    if order.user_id != user_id {
        return Err(AuthzError::NotAuthorized.into());
    }
    if order.status != OrderStatus::Pending {
        return Err(ServiceError::Conflict("Order is not awaiting payment".to_string()));
    }
    let user = found(storage.get_user(user_id).await?, "User")?;

    let intent = gateway
        .create_intent(order.total_amount, order.id, &user.email)
        .await?;

    storage
        .create_payment(NewPayment {
            order_id: order.id,
            user_id,
            amount: order.total_amount,
            stripe_payment_intent_id: intent.id.clone(),
        })
        .await?;

    tracing::info!(order_id = %order.id, intent_id = %intent.id, amount = order.total_amount, "Payment intent created");

    Ok(CreatedIntent {
        client_secret: intent.client_secret,
        payment_intent_id: intent.id,
        amount: order.total_amount,
    })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Confirmation {
    pub payment: PaymentRecord,

    /// Status reported by the gateway
    pub intent_status: String,
}

/// Reconciles a payment record with the gateway
///
/// On success the order moves to `processing` and the customer earns one
/// loyalty point per MWK; both happen only on the confirmation that flips
/// the record out of `pending`.
pub async fn confirm(
    storage: &dyn Storage,
    gateway: &dyn PaymentGateway,
    user_id: Uuid,
    intent_id: &str,
    order_id: Uuid,
) -> ServiceResult<Confirmation> {
    let record = found(storage.payment_by_intent(intent_id).await?, "Payment")?;
    if record.user_id != user_id {
        return Err(AuthzError::NotAuthorized.into());
    }
    if record.order_id != order_id {
        return Err(ServiceError::validation("Payment does not belong to this order"));
    }

    let intent = gateway.retrieve_intent(intent_id).await?;

    let payment = match intent.status.as_str() {
        "succeeded" => {
            match storage
                .transition_payment(record.id, PaymentStatus::Pending, PaymentStatus::Succeeded)
                .await?
            {
                Some(updated) => {
                    settle(storage, &updated).await?;
                    updated
                }
                None => record,
            }
        }
        "canceled" => storage
            .transition_payment(record.id, PaymentStatus::Pending, PaymentStatus::Failed)
            .await?
            .unwrap_or(record),
        _ => record,
    };

    Ok(Confirmation {
        payment,
        intent_status: intent.status,
    })
}

/// Effects of a freshly succeeded payment
async fn settle(storage: &dyn Storage, payment: &PaymentRecord) -> ServiceResult<()> {
    let order = found(storage.get_order(payment.order_id).await?, "Order")?.order;

    if let Some(order) = storage
        .transition_order(order.id, &[OrderStatus::Pending], OrderStatus::Processing)
        .await?
    {
        notifications::notify_order_status_change(storage, &order, OrderStatus::Processing).await;
    }

    let account = storage
        .add_loyalty_points(payment.user_id, order.total_amount, order.total_amount)
        .await?;

    tracing::info!(
        order_id = %order.id,
        payment_id = %payment.id,
        points = account.points,
        tier = ?account.tier,
        "Payment succeeded"
    );
    Ok(())
}

/// Refunds an order's successful payment and cancels the order
pub async fn refund(
    storage: &dyn Storage,
    gateway: &dyn PaymentGateway,
    order_id: Uuid,
) -> ServiceResult<PaymentRecord> {
    let order = found(storage.get_order(order_id).await?, "Order")?.order;
    let payment = storage
        .payments_for_order(order_id)
        .await?
        .into_iter()
        .find(|p| p.status == PaymentStatus::Succeeded)
        .ok_or_else(|| ServiceError::validation("Order has no successful payment to refund"))?;

    let refund = gateway.refund(&payment.stripe_payment_intent_id).await?;

    let refunded = storage
        .transition_payment(payment.id, PaymentStatus::Succeeded, PaymentStatus::Refunded)
        .await?
        .ok_or_else(|| ServiceError::Conflict("Payment was already refunded".to_string()))?;

    if order.status != OrderStatus::Cancelled {
        if let Some(order) = storage
            .update_order_status(order_id, OrderStatus::Cancelled)
            .await?
        {
            notifications::notify_order_status_change(storage, &order, OrderStatus::Cancelled).await;
        }
    }

    tracing::info!(order_id = %order_id, refund_id = %refund.id, "Payment refunded");
    Ok(refunded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        loyalty::LoyaltyTier,
        order::{NewOrder, NewOrderItem},
        user::{CreateUser, UserRole},
    };
    use crate::storage::MemoryStorage;

    struct CanceledGateway;

    #[async_trait]
    impl PaymentGateway for CanceledGateway {
        async fn create_intent(&self, a: i64, o: Uuid, e: &str) -> Result<PaymentIntent, PaymentError> {
            MockGateway.create_intent(a, o, e).await
        }

        async fn retrieve_intent(&self, intent_id: &str) -> Result<PaymentIntent, PaymentError> {
            Ok(PaymentIntent {
                id: intent_id.to_string(),
                client_secret: None,
                status: "canceled".to_string(),
                amount: 0,
            })
        }

        async fn refund(&self, _intent_id: &str) -> Result<Refund, PaymentError> {
            Err(PaymentError::Provider {
                status: 400,
                message: "nothing to refund".to_string(),
            })
        }
    }

    async fn setup(quantity: i32) -> (MemoryStorage, Uuid, Uuid, i64) {
        let storage = MemoryStorage::seeded();
        let user = storage
            .create_user(CreateUser {
                email: "mphatso@example.mw".to_string(),
                password_hash: "x".to_string(),
                first_name: None,
                last_name: None,
                phone_number: None,
                role: UserRole::Customer,
                vehicle_number: None,
                driver_license_number: None,
            })
            .await
            .unwrap();
        let product = storage.list_products(false).await.unwrap().remove(0);
        let price = product.unit_price().unwrap();
        let order = storage
            .create_order(NewOrder {
                user_id: user.id,
                delivery_location: "Lilongwe".to_string(),
                items: vec![NewOrderItem {
                    product_id: product.id,
                    product_name: product.name,
                    quantity,
                    unit_price: price,
                    subtotal: price * i64::from(quantity),
                }],
            })
            .await
            .unwrap();
        (storage, user.id, order.order.id, order.order.total_amount)
    }

    #[tokio::test]
    async fn test_confirm_awards_points_once() {
        let (storage, user, order, total) = setup(4).await;
        let intent = create_intent(&storage, &MockGateway, user, order).await.unwrap();
        assert_eq!(intent.amount, total);
        assert!(intent.client_secret.is_some());

        let first = confirm(&storage, &MockGateway, user, &intent.payment_intent_id, order)
            .await
            .unwrap();
        assert_eq!(first.payment.status, PaymentStatus::Succeeded);

        let second = confirm(&storage, &MockGateway, user, &intent.payment_intent_id, order)
            .await
            .unwrap();
        assert_eq!(second.payment.status, PaymentStatus::Succeeded);

        let account = storage.get_loyalty(user).await.unwrap();
        assert_eq!(account.points, total);
        assert_eq!(account.total_spent, total);
        assert_eq!(account.tier, LoyaltyTier::for_points(total));

        let order = storage.get_order(order).await.unwrap().unwrap().order;
        assert_eq!(order.status, OrderStatus::Processing);
    }

    #[tokio::test]
    async fn test_intent_requires_owner_and_pending() {
        let (storage, user, order, _) = setup(1).await;
        let err = create_intent(&storage, &MockGateway, Uuid::new_v4(), order)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));

        storage
            .update_order_status(order, OrderStatus::Cancelled)
            .await
            .unwrap();
        let err = create_intent(&storage, &MockGateway, user, order).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_canceled_intent_marks_failed() {
        let (storage, user, order, _) = setup(1).await;
        let intent = create_intent(&storage, &CanceledGateway, user, order).await.unwrap();

        let result = confirm(&storage, &CanceledGateway, user, &intent.payment_intent_id, order)
            .await
            .unwrap();
        assert_eq!(result.payment.status, PaymentStatus::Failed);
        assert_eq!(storage.get_loyalty(user).await.unwrap().points, 0);
    }

    #[tokio::test]
    async fn test_refund_cancels_order() {
        let (storage, user, order, _) = setup(1).await;
        let intent = create_intent(&storage, &MockGateway, user, order).await.unwrap();
        confirm(&storage, &MockGateway, user, &intent.payment_intent_id, order)
            .await
            .unwrap();

        let refunded = refund(&storage, &MockGateway, order).await.unwrap();
        assert_eq!(refunded.status, PaymentStatus::Refunded);
        let order_row = storage.get_order(order).await.unwrap().unwrap().order;
        assert_eq!(order_row.status, OrderStatus::Cancelled);

        let err = refund(&storage, &MockGateway, order).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }
}
