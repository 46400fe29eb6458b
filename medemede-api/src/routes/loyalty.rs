//! `GET /api/loyalty`: the caller's points, spend, and tier

use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, Extension, Json};
use medemede_shared::{
    auth::middleware::AuthContext, models::loyalty::LoyaltyAccount, services::customer,
};

pub async fn get_loyalty(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<LoyaltyAccount>> {
    Ok(Json(customer::loyalty(state.store(), auth.user_id).await?))
}
