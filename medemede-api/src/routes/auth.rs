//! Authentication endpoints
//!
//! - `POST /api/auth/register`: sign up as a customer or driver
//! - `POST /api/auth/login`: exchange credentials for tokens
//! - `POST /api/auth/refresh`: exchange a refresh token for a new pair
//! - `POST /api/auth/logout`: clear the session cookie
//! - `GET /api/auth/user`: the signed-in profile
//!
//! Login, registration, and refresh set the access token as an HttpOnly
//! session cookie and also return it in the body for API clients.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use medemede_shared::{
    auth::{
        jwt::{self, TokenPair},
        middleware::{clear_session_cookie, session_cookie, AuthContext},
    },
    models::user::User,
    services::accounts::{self, Origin, Registration},
};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub user: User,

    #[serde(flatten)]
    pub tokens: TokenPair,
}

/// Issues tokens for `user` and sets the session cookie
fn signed_in(state: &AppState, status: StatusCode, user: User) -> ApiResult<Response> {
    let tokens = jwt::issue_pair(user.id, user.role, state.jwt_secret())?;
    let cookie = session_cookie(
        &tokens.access_token,
        tokens.expires_in,
        state.config.api.production,
    );

    Ok((
        status,
        [(header::SET_COOKIE, cookie)],
        Json(AuthResponse { user, tokens }),
    )
        .into_response())
}

/// Register a new customer or driver account
///
/// ```text
/// POST /api/auth/register
///
/// {
///   "email": "chikondi@example.mw",
///   "password": "Lilongwe2024",
///   "firstName": "Chikondi",
///   "phoneNumber": "+265991234567",
///   "role": "customer"
/// }
/// ```
///
/// # Errors
///
/// - `400`: validation failed, weak password, email already registered,
///   admin role requested, or a driver without a vehicle number
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<Registration>,
) -> ApiResult<Response> {
    req.validate()?;

    let user = accounts::register(state.store(), req, Origin::SelfService).await?;
    tracing::info!(user_id = %user.id, role = %user.role, "User registered");

    signed_in(&state, StatusCode::CREATED, user)
}

/// # Errors
///
/// - `401`: "Invalid email or password"
/// - `403`: "Account is deactivated"
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Response> {
    req.validate()?;

    let user = accounts::login(state.store(), &req.email, &req.password).await?;
    tracing::info!(user_id = %user.id, "User logged in");

    signed_in(&state, StatusCode::OK, user)
}

/// Rotates the token pair
///
/// The account is reloaded so a role change or deactivation takes effect.
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<Response> {
    let claims = jwt::validate_refresh_token(&req.refresh_token, state.jwt_secret())?;

    let user = accounts::current_user(state.store(), claims.sub)
        .await
        .map_err(|_| ApiError::Unauthorized("Invalid refresh token".to_string()))?;
    if !user.is_active {
        return Err(ApiError::Forbidden("Account is deactivated".to_string()));
    }

    signed_in(&state, StatusCode::OK, user)
}

pub async fn logout(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::NO_CONTENT,
        [(header::SET_COOKIE, clear_session_cookie(state.config.api.production))],
    )
}

pub async fn current_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<User>> {
    let user = accounts::current_user(state.store(), auth.user_id).await?;
    Ok(Json(user))
}
