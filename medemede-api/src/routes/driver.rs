//! Driver app
//!
//! `GET /api/driver/available` is for admins picking a driver; everything
//! else acts as the signed-in driver.

use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{Path, State},
    Extension, Json,
};
use medemede_shared::{
    auth::middleware::AuthContext,
    models::{
        order::{Order, OrderWithItems},
        user::User,
    },
    services::{
        admin,
        driver::{self, DriverStats, LocationUpdate},
    },
};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct LocationPing {
    pub latitude: f64,

    pub longitude: f64,

    /// km/h
    pub speed: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityRequest {
    pub is_available: bool,
}

pub async fn available_drivers(State(state): State<AppState>) -> ApiResult<Json<Vec<User>>> {
    Ok(Json(admin::available_drivers(state.store()).await?))
}

pub async fn stats(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<DriverStats>> {
    Ok(Json(driver::stats(state.store(), auth.user_id).await?))
}

/// Orders the driver is working on
pub async fn deliveries(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<OrderWithItems>>> {
    Ok(Json(driver::deliveries(state.store(), auth.user_id).await?))
}

pub async fn history(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<OrderWithItems>>> {
    Ok(Json(driver::delivery_history(state.store(), auth.user_id).await?))
}

/// Paid orders nobody has picked up yet
pub async fn open_deliveries(State(state): State<AppState>) -> ApiResult<Json<Vec<OrderWithItems>>> {
    Ok(Json(driver::open_deliveries(state.store()).await?))
}

pub async fn update_location(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<LocationPing>,
) -> ApiResult<Json<LocationUpdate>> {
    let update = driver::update_location(
        state.store(),
        auth.user_id,
        req.latitude,
        req.longitude,
        req.speed,
    )
    .await?;
    Ok(Json(update))
}

pub async fn accept(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Order>> {
    Ok(Json(driver::accept_delivery(state.store(), auth.user_id, id).await?))
}

pub async fn start(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Order>> {
    Ok(Json(driver::start_delivery(state.store(), auth.user_id, id).await?))
}

pub async fn complete(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Order>> {
    Ok(Json(driver::complete_delivery(state.store(), auth.user_id, id).await?))
}

pub async fn set_availability(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<AvailabilityRequest>,
) -> ApiResult<Json<User>> {
    Ok(Json(
        driver::set_availability(state.store(), auth.user_id, req.is_available).await?,
    ))
}
