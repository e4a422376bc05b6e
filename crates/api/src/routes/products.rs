//! Public catalog routes

use axum::extract::{Path, State};
use axum::Json;
use caixa_payments::Product;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub async fn list_products(State(state): State<AppState>) -> ApiResult<Json<Vec<Product>>> {
    let products = state.payments.catalog.list_active().await?;
    Ok(Json(products))
}

pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Product>> {
    let product = state
        .payments
        .catalog
        .get_active(id)
        .await?
        .ok_or(ApiError::NotFound("product not found"))?;
    Ok(Json(product))
}
