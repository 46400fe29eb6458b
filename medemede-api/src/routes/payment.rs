//! Card payments
//!
//! The client creates an intent for a pending order, completes it with the
//! returned client secret, then asks the server to confirm. The amount always
//! comes from the stored order total.

use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, Extension, Json};
use medemede_shared::{
    auth::middleware::AuthContext,
    models::payment::PaymentRecord,
    services::payments::{self, Confirmation, CreatedIntent},
};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIntentRequest {
    pub order_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmRequest {
    pub payment_intent_id: String,

    pub order_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundRequest {
    pub order_id: Uuid,
}

pub async fn create_intent(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateIntentRequest>,
) -> ApiResult<Json<CreatedIntent>> {
    let intent =
        payments::create_intent(state.store(), state.gateway(), auth.user_id, req.order_id).await?;
    Ok(Json(intent))
}

pub async fn confirm(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<ConfirmRequest>,
) -> ApiResult<Json<Confirmation>> {
    let confirmation = payments::confirm(
        state.store(),
        state.gateway(),
        auth.user_id,
        &req.payment_intent_id,
        req.order_id,
    )
    .await?;
    Ok(Json(confirmation))
}

/// Admin only: refunds and cancels the order
pub async fn refund(
    State(state): State<AppState>,
    Json(req): Json<RefundRequest>,
) -> ApiResult<Json<PaymentRecord>> {
    Ok(Json(
        payments::refund(state.store(), state.gateway(), req.order_id).await?,
    ))
}
