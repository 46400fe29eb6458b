//! `GET /api/delivery/:order_id/tracking`
//!
//! Clients poll this for the order's status, its driver, and the latest
//! known position.

use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{Path, State},
    Extension, Json,
};
use medemede_shared::{
    auth::middleware::AuthContext,
    services::customer::{self, DeliveryStatus},
};
use uuid::Uuid;

pub async fn tracking(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(order_id): Path<Uuid>,
) -> ApiResult<Json<DeliveryStatus>> {
    Ok(Json(customer::track_delivery(state.store(), &auth, order_id).await?))
}
