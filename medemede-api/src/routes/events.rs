//! Storefront events: public listing, admin creation

use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, http::StatusCode, Json};
use medemede_shared::{
    models::event::{CreateEvent, Event},
    services::admin,
};

pub async fn list_events(State(state): State<AppState>) -> ApiResult<Json<Vec<Event>>> {
    Ok(Json(admin::active_events(state.store()).await?))
}

pub async fn create_event(
    State(state): State<AppState>,
    Json(req): Json<CreateEvent>,
) -> ApiResult<(StatusCode, Json<Event>)> {
    let event = admin::create_event(state.store(), req).await?;
    tracing::info!(event_id = %event.id, title = %event.title, "Event created");
    Ok((StatusCode::CREATED, Json(event)))
}
