//! Product catalogue
//!
//! Reads are public and only show products that are on sale; creating and
//! editing are admin only.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use medemede_shared::{
    models::product::{CreateProduct, Product, UpdateProduct},
    services::admin,
};
use uuid::Uuid;

pub async fn list_products(State(state): State<AppState>) -> ApiResult<Json<Vec<Product>>> {
    Ok(Json(state.store().list_products(false).await?))
}

pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Product>> {
    state
        .store()
        .get_product(id)
        .await?
        .filter(|p| p.is_available)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Product not found".to_string()))
}

pub async fn create_product(
    State(state): State<AppState>,
    Json(req): Json<CreateProduct>,
) -> ApiResult<(StatusCode, Json<Product>)> {
    let product = admin::create_product(state.store(), req).await?;
    tracing::info!(product_id = %product.id, name = %product.name, "Product created");
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateProduct>,
) -> ApiResult<Json<Product>> {
    Ok(Json(admin::update_product(state.store(), id, req).await?))
}
