//! Checkout and orders
//!
//! - `GET /api/orders`: the caller's orders, newest first
//! - `POST /api/orders`: check out the cart
//! - `GET /api/orders/:id`: owner, admin, or the delivering driver
//! - `PATCH /api/orders/:id`: admin status change, notifies the customer

use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use medemede_shared::{
    auth::middleware::AuthContext,
    models::order::{Order, OrderStatus, OrderWithItems},
    services::{admin, customer},
};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub delivery_location: String,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: OrderStatus,
}

pub async fn list_orders(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<OrderWithItems>>> {
    Ok(Json(customer::orders(state.store(), auth.user_id).await?))
}

pub async fn checkout(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CheckoutRequest>,
) -> ApiResult<(StatusCode, Json<OrderWithItems>)> {
    let order = customer::checkout(
        state.store(),
        auth.user_id,
        &req.delivery_location,
        state.config.shop.low_stock_threshold,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn get_order(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<OrderWithItems>> {
    Ok(Json(customer::order(state.store(), &auth, id).await?))
}

pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<StatusUpdate>,
) -> ApiResult<Json<Order>> {
    Ok(Json(admin::update_order_status(state.store(), id, req.status).await?))
}
