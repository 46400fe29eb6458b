//! Admin console
//!
//! Every route here sits behind the admin gate.

use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use medemede_shared::{
    models::{
        analytics::AnalyticsSummary,
        notification::NotificationLog,
        order::{Order, OrderWithItems},
        product::Product,
        user::User,
    },
    services::{accounts::Registration, admin},
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignDriverRequest {
    pub driver_id: Uuid,
}

#[derive(Debug, Default, Deserialize)]
pub struct AnalyticsQuery {
    /// 1..=365, default 30
    pub days: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NotificationsQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct InventoryQuery {
    /// Overrides the configured low-stock threshold
    pub threshold: Option<i32>,
}

pub async fn orders(State(state): State<AppState>) -> ApiResult<Json<Vec<OrderWithItems>>> {
    Ok(Json(admin::all_orders(state.store()).await?))
}

pub async fn assign_driver(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<AssignDriverRequest>,
) -> ApiResult<Json<Order>> {
    Ok(Json(admin::assign_driver(state.store(), id, req.driver_id).await?))
}

pub async fn drivers(State(state): State<AppState>) -> ApiResult<Json<Vec<User>>> {
    Ok(Json(admin::drivers(state.store()).await?))
}

pub async fn inventory_alerts(
    State(state): State<AppState>,
    Query(query): Query<InventoryQuery>,
) -> ApiResult<Json<Vec<Product>>> {
    let threshold = query
        .threshold
        .unwrap_or(state.config.shop.low_stock_threshold);
    Ok(Json(admin::low_stock(state.store(), threshold).await?))
}

pub async fn analytics(
    State(state): State<AppState>,
    Query(query): Query<AnalyticsQuery>,
) -> ApiResult<Json<Vec<AnalyticsSummary>>> {
    Ok(Json(admin::analytics(state.store(), query.days).await?))
}

pub async fn notifications(
    State(state): State<AppState>,
    Query(query): Query<NotificationsQuery>,
) -> ApiResult<Json<Vec<NotificationLog>>> {
    Ok(Json(admin::recent_notifications(state.store(), query.limit).await?))
}

/// Creates an admin, driver, or customer account
pub async fn create_user(
    State(state): State<AppState>,
    Json(req): Json<Registration>,
) -> ApiResult<(StatusCode, Json<User>)> {
    req.validate()?;
    let user = admin::create_staff_user(state.store(), req).await?;
    tracing::info!(user_id = %user.id, role = %user.role, "Staff account created");
    Ok((StatusCode::CREATED, Json(user)))
}

/// Whole catalogue, including products taken off sale
pub async fn products(State(state): State<AppState>) -> ApiResult<Json<Vec<Product>>> {
    Ok(Json(admin::products(state.store()).await?))
}

pub async fn toggle_availability(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Product>> {
    Ok(Json(admin::toggle_availability(state.store(), id).await?))
}
