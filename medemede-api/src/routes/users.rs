//! `PATCH /api/users/me`: edit the caller's own profile

use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, Extension, Json};
use medemede_shared::{
    auth::middleware::AuthContext,
    models::user::User,
    services::accounts::{self, ProfileUpdate},
};
use validator::Validate;

pub async fn update_me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<ProfileUpdate>,
) -> ApiResult<Json<User>> {
    req.validate()?;
    let user = accounts::update_profile(state.store(), auth.user_id, req).await?;
    Ok(Json(user))
}
