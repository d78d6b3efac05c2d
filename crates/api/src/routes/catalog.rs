//! Public catalog browsing.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::{Product, ProductId};
use store::Store;

use crate::error::ApiError;
use crate::state::AppState;

/// GET /products: active products, newest first.
#[tracing::instrument(skip(state))]
pub async fn list<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<Product>>, ApiError> {
    Ok(Json(state.catalog.list_active().await?))
}

/// GET /products/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<i64>,
) -> Result<Json<Product>, ApiError> {
    Ok(Json(state.catalog.get_active(ProductId::new(id)).await?))
}
