//! Administrator endpoints. Every handler requires the `admin` claim.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::{Order, OrderId, Product, ProductId, ProductStats};
use domain::ProductDraft;
use serde::Deserialize;
use store::Store;

use crate::auth::AdminCaller;
use crate::error::{ApiError, ApiJson};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteProductParams {
    /// Hard delete instead of deactivating.
    #[serde(default)]
    pub purge: bool,
}

/// GET /admin/orders
#[tracing::instrument(skip(state, _admin))]
pub async fn list_orders<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _admin: AdminCaller,
) -> Result<Json<Vec<Order>>, ApiError> {
    Ok(Json(state.orders.list_all().await?))
}

/// PUT /admin/orders/{id}/status: overwrites the status with any valid value.
#[tracing::instrument(skip(state, admin), fields(admin = %admin.0.owner))]
pub async fn update_order_status<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    admin: AdminCaller,
    Path(id): Path<i64>,
    ApiJson(body): ApiJson<StatusRequest>,
) -> Result<Json<Order>, ApiError> {
    let order = state
        .orders
        .update_order_status(OrderId::new(id), &body.status)
        .await?;
    Ok(Json(order))
}

/// GET /admin/products: includes inactive products.
#[tracing::instrument(skip(state, _admin))]
pub async fn list_products<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _admin: AdminCaller,
) -> Result<Json<Vec<Product>>, ApiError> {
    Ok(Json(state.catalog.list_all().await?))
}

/// POST /admin/products
#[tracing::instrument(skip(state, _admin, draft))]
pub async fn create_product<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _admin: AdminCaller,
    ApiJson(draft): ApiJson<ProductDraft>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    let product = state.catalog.create(draft).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// DELETE /admin/products/{id}[?purge=true]
#[tracing::instrument(skip(state, _admin))]
pub async fn delete_product<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _admin: AdminCaller,
    Path(id): Path<i64>,
    Query(params): Query<DeleteProductParams>,
) -> Result<StatusCode, ApiError> {
    let id = ProductId::new(id);
    if params.purge {
        state.catalog.purge(id).await?;
    } else {
        state.catalog.deactivate(id).await?;
    }
    Ok(StatusCode::NO_CONTENT)
}

/// GET /admin/products/stats
#[tracing::instrument(skip(state, _admin))]
pub async fn product_stats<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _admin: AdminCaller,
) -> Result<Json<ProductStats>, ApiError> {
    Ok(Json(state.catalog.stats().await?))
}
