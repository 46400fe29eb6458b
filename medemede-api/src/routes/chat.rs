//! Order and support chat
//!
//! Clients poll `GET /api/chat` with optional `orderId` and `role` filters.

use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Extension, Json,
};
use medemede_shared::{
    auth::middleware::AuthContext,
    models::message::{Message, MessageFilter},
    services::chat::{self, PostMessage},
};

pub async fn list_messages(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(filter): Query<MessageFilter>,
) -> ApiResult<Json<Vec<Message>>> {
    Ok(Json(chat::list_messages(state.store(), &auth, filter).await?))
}

pub async fn post_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<PostMessage>,
) -> ApiResult<(StatusCode, Json<Message>)> {
    let message = chat::post_message(state.store(), &auth, req).await?;
    Ok((StatusCode::CREATED, Json(message)))
}
