//! Authentication and role gates
//!
//! Each gate validates the access token (bearer header or session cookie),
//! checks the caller's role, and injects [`AuthContext`] into the request
//! extensions for handlers to extract with `Extension<AuthContext>`.

use crate::app::AppState;
use crate::error::ApiError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use medemede_shared::auth::{
    authorization::require_any_role,
    middleware::{authenticate, AuthContext},
};
use medemede_shared::models::user::UserRole;

async fn gate(
    state: &AppState,
    mut req: Request,
    next: Next,
    roles: &[UserRole],
) -> Result<Response, ApiError> {
    let auth: AuthContext = authenticate(req.headers(), state.jwt_secret())?;
    if !roles.is_empty() {
        require_any_role(&auth, roles).map_err(|e| {
            tracing::debug!(user_id = %auth.user_id, role = %auth.role, path = %req.uri().path(), "Role gate denied");
            e
        })?;
    }
    req.extensions_mut().insert(auth);
    Ok(next.run(req).await)
}

/// Any signed-in user
pub async fn authenticated(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    gate(&state, req, next, &[]).await
}

pub async fn admin_only(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    gate(&state, req, next, &[UserRole::Admin]).await
}

pub async fn driver_only(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    gate(&state, req, next, &[UserRole::Driver]).await
}
